use rand::Rng;

pub const CODE_LENGTH: usize = 8;
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Short human-shareable image code, e.g. `K3Z09QXA`. Independent of the
/// document id and produced without touching the store; the store re-draws on
/// the rare collision.
pub fn generate_image_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_image_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|x| ALPHABET.contains(&x))
}
