use std::io::{self, Cursor, Read, Write};

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    DecodeError, Engine,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use uuid::Uuid;

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes base64 payloads from the manifest, which are frequently wrapped or missing padding.
pub fn base64_decode<T: AsRef<[u8]>>(input: T) -> Result<Vec<u8>, DecodeError> {
    let input: Vec<u8> = input
        .as_ref()
        .iter()
        .copied()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    LENIENT.decode(input)
}

/// A `pssh` box, ISO/IEC 23001-7 section 8.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsshBox {
    pub version: u8,
    pub system_id: Uuid,
    /// Only present in version 1 boxes.
    pub key_ids: Vec<Uuid>,
    pub data: Vec<u8>,
}

impl PsshBox {
    pub fn new(system_id: Uuid, key_ids: Vec<Uuid>, data: Vec<u8>) -> Self {
        Self {
            version: if key_ids.is_empty() { 0 } else { 1 },
            system_id,
            key_ids,
            data,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut size = 32 + self.data.len();
        if self.version > 0 {
            size += 4 + 16 * self.key_ids.len();
        }

        let mut buf = Vec::with_capacity(size);
        self.write_to(&mut buf, size as u32)
            .expect("writing to a Vec never fails");
        buf
    }

    fn write_to<W: Write>(&self, buf: &mut W, size: u32) -> io::Result<()> {
        buf.write_u32::<BigEndian>(size)?;
        buf.write_all(b"pssh")?;
        buf.write_u32::<BigEndian>((self.version as u32) << 24)?;
        buf.write_all(self.system_id.as_bytes())?;
        if self.version > 0 {
            buf.write_u32::<BigEndian>(self.key_ids.len() as u32)?;
            for key_id in self.key_ids.iter() {
                buf.write_all(key_id.as_bytes())?;
            }
        }
        buf.write_u32::<BigEndian>(self.data.len() as u32)?;
        buf.write_all(&self.data)?;
        Ok(())
    }
}

impl TryFrom<&[u8]> for PsshBox {
    type Error = io::Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let invalid = |message: &str| io::Error::new(io::ErrorKind::InvalidData, message.to_string());

        if value.len() < 32 || &value[4..8] != b"pssh" {
            return Err(invalid("Invalid pssh header"));
        }

        let mut buf = Cursor::new(value);
        let size = buf.read_u32::<BigEndian>()? as usize;
        if size != value.len() {
            return Err(invalid("Invalid pssh box size"));
        }
        buf.set_position(8);

        let version = buf.read_u8()?;
        if version > 1 {
            return Err(invalid("Unsupported pssh version"));
        }
        buf.set_position(12);

        let mut system_id = [0u8; 16];
        buf.read_exact(&mut system_id)?;

        let mut key_ids = Vec::new();
        if version == 1 {
            let key_id_count = buf.read_u32::<BigEndian>()? as usize;
            if key_id_count > remaining(&buf) / 16 {
                return Err(invalid("Invalid pssh key id count"));
            }
            key_ids.reserve(key_id_count);
            for _ in 0..key_id_count {
                let mut key_id = [0u8; 16];
                buf.read_exact(&mut key_id)?;
                key_ids.push(Uuid::from_bytes(key_id));
            }
        }

        let data_length = buf.read_u32::<BigEndian>()? as usize;
        if data_length != remaining(&buf) {
            return Err(invalid("Invalid pssh data size"));
        }
        let mut data = vec![0u8; data_length];
        buf.read_exact(&mut data)?;

        Ok(Self {
            version,
            system_id: Uuid::from_bytes(system_id),
            key_ids,
            data,
        })
    }
}

fn remaining(buf: &Cursor<&[u8]>) -> usize {
    buf.get_ref()
        .len()
        .saturating_sub(buf.position() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_ID: Uuid = uuid::uuid!("edef8ba9-79d6-4ace-a3c8-27dcd51d21ed");
    const KEY_ID: Uuid = uuid::uuid!("0123456789abcdef0123456789abcdef");

    #[test]
    fn test_version_0_layout() {
        let pssh = PsshBox::new(SYSTEM_ID, Vec::new(), vec![1, 2, 3]);
        let bytes = pssh.to_bytes();

        assert_eq!(bytes.len(), 35);
        assert_eq!(&bytes[0..4], &[0, 0, 0, 35]);
        assert_eq!(&bytes[4..8], b"pssh");
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
        assert_eq!(&bytes[12..28], SYSTEM_ID.as_bytes());
        assert_eq!(&bytes[28..32], &[0, 0, 0, 3]);
        assert_eq!(PsshBox::try_from(bytes.as_slice()).unwrap(), pssh);
    }

    #[test]
    fn test_version_1_layout() {
        let pssh = PsshBox::new(SYSTEM_ID, vec![KEY_ID], Vec::new());
        let bytes = pssh.to_bytes();

        assert_eq!(bytes.len(), 52);
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0]);
        assert_eq!(&bytes[28..32], &[0, 0, 0, 1]);
        assert_eq!(&bytes[32..48], KEY_ID.as_bytes());
        assert_eq!(&bytes[48..52], &[0, 0, 0, 0]);

        let parsed = PsshBox::try_from(bytes.as_slice()).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.key_ids, vec![KEY_ID]);
    }

    #[test]
    fn test_invalid_boxes() {
        assert!(PsshBox::try_from(&b"not a pssh box"[..]).is_err());

        let mut bytes = PsshBox::new(SYSTEM_ID, Vec::new(), vec![1, 2, 3]).to_bytes();
        bytes.truncate(34);
        assert!(PsshBox::try_from(bytes.as_slice()).is_err());
    }

    #[test]
    fn test_declared_lengths_exceed_payload() {
        // data size of 0xffffffff with a 3 byte payload
        let mut bytes = PsshBox::new(SYSTEM_ID, Vec::new(), vec![1, 2, 3]).to_bytes();
        bytes[28..32].copy_from_slice(&[0xff; 4]);
        assert!(PsshBox::try_from(bytes.as_slice()).is_err());

        // trailing bytes after the declared data
        let mut bytes = PsshBox::new(SYSTEM_ID, Vec::new(), vec![1, 2, 3]).to_bytes();
        bytes[31] = 2;
        assert!(PsshBox::try_from(bytes.as_slice()).is_err());

        // 0xffffffff key ids
        let mut bytes = PsshBox::new(SYSTEM_ID, vec![KEY_ID], Vec::new()).to_bytes();
        bytes[28..32].copy_from_slice(&[0xff; 4]);
        assert!(PsshBox::try_from(bytes.as_slice()).is_err());
    }

    #[test]
    fn test_base64_decode() {
        assert_eq!(base64_decode("AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(base64_decode("AQ").unwrap(), vec![1]);
        assert_eq!(base64_decode("AQ\n  ID").unwrap(), vec![1, 2, 3]);
        assert!(base64_decode("!!!").is_err());
    }
}
