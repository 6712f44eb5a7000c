use std::path::Path;

/// Build the deterministic, collision-resistant identifier for a chunk.
///
/// id = `"<file>::<entity_type>::<name>::<chunk_type>"` plus an MD5 suffix of
/// the same string extended with the line range. The prefix keeps ids
/// debuggable; the suffix guarantees uniqueness when multiple entities share
/// a name in one file.
pub fn chunk_id(
    file_path: &Path,
    entity_type: &str,
    name: &str,
    chunk_type: &str,
    start_line: u32,
    end_line: u32,
) -> String {
    let prefix = format!(
        "{}::{}::{}::{}",
        file_path.display(),
        entity_type,
        name,
        chunk_type
    );
    let digest = md5::compute(format!("{prefix}::{start_line}::{end_line}"));
    let hex = format!("{digest:x}");
    format!("{}::{}", prefix, &hex[..16])
}
