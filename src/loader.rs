//! Image loading: a raw big-endian binary, origin word first.

use crate::error::VmError;
use crate::vm::memory::{Memory, MEMORY_SIZE};
use byteorder::{BigEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read};

/// Reads an image from `path` and writes it into `memory` starting at the
/// origin word the image itself encodes. Returns an error if the file
/// can't be read or the image doesn't fit before address 0xFFFF.
pub fn load_image(path: &str, memory: &mut Memory) -> Result<(), VmError> {
    let file = File::open(path).map_err(|e| VmError::Load(format!("{}: {}", path, e)))?;
    load_from_reader(BufReader::new(file), memory)
        .map_err(|e| VmError::Load(format!("{}: {}", path, e)))
}

/// Same as `load_image` but against any byte source; split out so tests
/// can exercise the parsing logic without touching the filesystem.
fn load_from_reader<R: Read>(mut reader: R, memory: &mut Memory) -> io::Result<()> {
    let origin = reader.read_u16::<BigEndian>()?;

    let mut address = origin as usize;
    loop {
        match reader.read_u16::<BigEndian>() {
            Ok(word) => {
                if address >= MEMORY_SIZE {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("image overflows memory past origin {:#06x}", origin),
                    ));
                }
                memory.write(address as u16, word);
                address += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::FakeConsole;
    use std::io::Cursor;

    fn memory_with_fake_console() -> Memory {
        Memory::new(Box::new(FakeConsole::new(&[])))
    }

    fn image_bytes(origin: u16, words: &[u16]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&origin.to_be_bytes());
        for word in words {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn loads_origin_and_words() {
        let mut memory = memory_with_fake_console();
        let bytes = image_bytes(0x3000, &[0x1220, 0xF025]);

        load_from_reader(Cursor::new(bytes), &mut memory).unwrap();

        assert_eq!(memory.read(0x3000), 0x1220);
        assert_eq!(memory.read(0x3001), 0xF025);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let mut memory = memory_with_fake_console();
        let result = load_image("/nonexistent/path/to/image.obj", &mut memory);
        assert!(matches!(result, Err(VmError::Load(_))));
    }

    #[test]
    fn oversize_image_is_a_load_error() {
        let mut memory = memory_with_fake_console();
        // origin one word from the end of memory, but two data words follow.
        let bytes = image_bytes(0xFFFF, &[0x0000, 0x0000]);

        let result = load_from_reader(Cursor::new(bytes), &mut memory);
        assert!(result.is_err());
    }
}
