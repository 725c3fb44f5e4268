//! Fixed-size operands of the AES unit

/// Size of one AES block in bytes
pub const BLOCK_SIZE: usize = 16;

/// Size of the only key the unit accepts (AES-128)
pub const KEY_SIZE: usize = 16;

/// A 128-bit block
///
/// The AES unit processes 128 bits at a time, so this represents one unit
/// of processing. Every operand handed to [`crate::aes::Aes`] is exactly one
/// `Block`.
pub type Block = [u8; BLOCK_SIZE];

/// 128-bit key material
pub type Key = [u8; KEY_SIZE];

/// XORs two blocks byte by byte
pub fn xor_blocks(a: &Block, b: &Block) -> Block {
    let mut out = [0; BLOCK_SIZE];
    for ((out, a), b) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *out = a ^ b;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_with_zero_is_identity() {
        let a: Block = [0xa5; BLOCK_SIZE];
        assert_eq!(xor_blocks(&a, &[0; BLOCK_SIZE]), a);
    }

    #[test]
    fn xor_is_self_inverse() {
        let mut a = [0; BLOCK_SIZE];
        let mut b = [0; BLOCK_SIZE];
        for i in 0..BLOCK_SIZE {
            a[i] = i as u8;
            b[i] = 0xf0 ^ (i as u8 * 7);
        }

        let x = xor_blocks(&a, &b);
        assert_ne!(x, a);
        assert_eq!(xor_blocks(&x, &b), a);
        assert_eq!(xor_blocks(&a, &a), [0; BLOCK_SIZE]);
    }
}
