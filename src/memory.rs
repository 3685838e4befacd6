//! Reading NUL-terminated strings out of the stopped subordinate
//!
//! Memory is fetched one machine word at a time (`PTRACE_PEEKDATA`), so a
//! string that ends just before an unmapped page is still read completely.

/// Word-granular read access to another process's address space
pub trait RemoteMemory {
    /// Read the machine word at `addr`
    fn read_word(&self, addr: u64) -> nix::Result<libc::c_long>;
}

/// Bytes of a remote C string, without the terminator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteString {
    pub bytes: Vec<u8>,
    /// The NUL byte was reached, so `bytes` is the whole string
    pub terminated: bool,
    /// The length cap was hit before a NUL byte was seen
    pub truncated: bool,
}

impl RemoteString {
    /// Lossy UTF-8 view, invalid sequences become U+FFFD
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Copy the string at `addr` out of the subordinate, at most `max_len` bytes
///
/// A null `addr` yields an empty string. A failing word read ends the scan
/// and whatever was gathered so far is returned.
pub fn read_c_string<M: RemoteMemory + ?Sized>(
    memory: &M,
    addr: u64,
    max_len: usize,
) -> RemoteString {
    let mut out = RemoteString::default();
    if addr == 0 {
        return out;
    }

    let word_size = std::mem::size_of::<libc::c_long>() as u64;
    let mut word_addr = addr;
    loop {
        let word = match memory.read_word(word_addr) {
            Ok(word) => word,
            Err(errno) => {
                tracing::trace!(
                    addr = word_addr,
                    %errno,
                    read = out.bytes.len(),
                    "remote read stopped early"
                );
                return out;
            }
        };
        for byte in word.to_ne_bytes() {
            if byte == 0 {
                out.terminated = true;
                return out;
            }
            if out.bytes.len() >= max_len {
                out.truncated = true;
                return out;
            }
            out.bytes.push(byte);
        }
        word_addr = word_addr.wrapping_add(word_size);
    }
}
