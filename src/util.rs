use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

const HEX: &[u8; 16] = b"0123456789abcdef";

static COMPLETION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static COMPLETION_ID_SEED: OnceLock<u64> = OnceLock::new();

#[inline]
fn mix_u64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Generate a per-request completion id of the form `chatcmpl-<16 hex>`.
///
/// Ids are unique within a process and do not collide across restarts in
/// practice because the counter is mixed with the startup timestamp.
pub(crate) fn next_completion_id() -> String {
    let seed = *COMPLETION_ID_SEED.get_or_init(|| mix_u64(unix_now_secs()));
    let seq = COMPLETION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut out = String::with_capacity(25);
    out.push_str("chatcmpl-");
    push_u64_hex_16(&mut out, mix_u64(seq) ^ seed);
    out
}

#[inline]
fn push_u64_hex_16(out: &mut String, mut value: u64) {
    let mut buf = [b'0'; 16];
    let mut idx = 16;
    while idx > 0 {
        idx -= 1;
        let nibble = usize::try_from(value & 0x0f).unwrap_or(0);
        buf[idx] = HEX[nibble];
        value >>= 4;
    }
    for byte in buf {
        out.push(char::from(byte));
    }
}

#[cfg(test)]
mod tests {
    use super::next_completion_id;

    #[test]
    fn completion_ids_have_expected_shape() {
        let id = next_completion_id();
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), "chatcmpl-".len() + 16);
        assert!(id["chatcmpl-".len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn completion_ids_are_unique() {
        let a = next_completion_id();
        let b = next_completion_id();
        assert_ne!(a, b);
    }
}
