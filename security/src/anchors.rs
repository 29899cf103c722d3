//! Trust anchors on disk.
//!
//! A certificate directory holds one `*.cert` file per anchor, each
//! containing the hex-encoded wire form of the certificate packet.

use std::path::Path;

use fieldnode_types::IdentityCertificate;

use crate::SecurityError;

/// File extension of certificate files.
pub const CERTIFICATE_EXTENSION: &str = "cert";

/// Read every decodable certificate in `directory`.
///
/// Files that fail to decode are skipped with a warning; a missing
/// directory is an error the caller may choose to ignore.
pub fn load_certificate_directory(
    directory: &Path,
) -> Result<Vec<IdentityCertificate>, SecurityError> {
    let mut certificates = Vec::new();
    let mut paths: Vec<_> = std::fs::read_dir(directory)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == CERTIFICATE_EXTENSION))
        .collect();
    paths.sort();

    for path in paths {
        let decoded = std::fs::read_to_string(&path)
            .map_err(SecurityError::from)
            .and_then(|text| {
                hex::decode(text.trim()).map_err(|e| SecurityError::Persistence(e.to_string()))
            })
            .and_then(|bytes| {
                IdentityCertificate::wire_decode(&bytes).map_err(SecurityError::from)
            });
        match decoded {
            Ok(certificate) => certificates.push(certificate),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "skipping unreadable certificate"
            ),
        }
    }
    Ok(certificates)
}

/// Write a certificate in the format read by [`load_certificate_directory`].
pub fn write_certificate_file(
    path: &Path,
    certificate: &IdentityCertificate,
) -> Result<(), SecurityError> {
    std::fs::write(path, hex::encode(certificate.wire_encode()?))?;
    Ok(())
}
