//! SHA-256 checksum over the mmap file's data columns only (§4.8). Kept as
//! its own unit — independently testable — rather than inlined into the
//! writer, grounded on the original implementation's standalone
//! `common/sha256` module (`SPEC_FULL.md` §2).

use sha2::{Digest, Sha256};

pub fn checksum(data_columns: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data_columns);
    hasher.finalize().into()
}
