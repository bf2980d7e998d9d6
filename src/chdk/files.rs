//! File transfer between host and camera
//!
//! Uploads travel as one data phase: `[u32 path length][path][file bytes]`.
//! Large files are not split into several transactions here; a transport
//! with a maximum transfer size has to chunk below this layer.
//!
//! Downloads take two transactions: the remote path is staged with
//! `TempData`, then `DownloadFile` returns the file as its data phase.

use super::{ChdkCamera, nul_terminated};
use crate::container::codes;
use crate::{PtpError, Result, Transport};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Build the upload blob for `remote_path`.
pub fn pack_upload(remote_path: &str, contents: &[u8]) -> Vec<u8> {
    let path = remote_path.as_bytes();
    let mut blob = Vec::with_capacity(4 + path.len() + contents.len());
    blob.extend_from_slice(&(path.len() as u32).to_le_bytes());
    blob.extend_from_slice(path);
    blob.extend_from_slice(contents);
    blob
}

impl<T: Transport> ChdkCamera<T> {
    /// Upload a local file.
    ///
    /// `remote_path` defaults to the local file name, which CHDK places in
    /// the card root.
    pub fn upload_file(
        &mut self,
        local_path: &Path,
        remote_path: Option<&str>,
        timeout: Duration,
    ) -> Result<()> {
        let contents = std::fs::read(local_path)
            .map_err(|e| PtpError::io_error(local_path.to_path_buf(), e))?;
        let remote = match remote_path {
            Some(remote) => remote.to_string(),
            None => local_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| PtpError::Config {
                    details: format!("{} has no file name", local_path.display()),
                })?,
        };
        self.upload_bytes(&remote, &contents, timeout)
    }

    /// Upload `contents` to `remote_path`.
    pub fn upload_bytes(
        &mut self,
        remote_path: &str,
        contents: &[u8],
        timeout: Duration,
    ) -> Result<()> {
        let blob = pack_upload(remote_path, contents);
        self.chdk_op(codes::chdk::UPLOAD_FILE, &[], Some(blob), false, timeout, "file upload")?;
        info!(remote = remote_path, bytes = contents.len(), "Uploaded file");
        Ok(())
    }

    /// Download `remote_path` from the camera.
    pub fn download_file(&mut self, remote_path: &str, timeout: Duration) -> Result<Vec<u8>> {
        let staged = self.chdk_op(
            codes::chdk::TEMP_DATA,
            &[codes::chdk::TEMP_DATA_DOWNLOAD],
            Some(nul_terminated(remote_path)),
            false,
            timeout,
            "download path",
        )?;
        check_status(staged.response.param(0), "download path")?;
        debug!(remote = remote_path, "Staged download path");

        let result =
            self.chdk_op(codes::chdk::DOWNLOAD_FILE, &[], None, true, timeout, "file download")?;
        check_status(result.response.param(0), "file download")?;
        let data = result
            .data
            .ok_or_else(|| PtpError::framing("File download", "Camera sent no data phase"))?;

        let contents = data.into_payload();
        info!(remote = remote_path, bytes = contents.len(), "Downloaded file");
        Ok(contents)
    }

    /// Download `remote_path` and write it to `local_path`.
    pub fn download_to(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> Result<()> {
        let contents = self.download_file(remote_path, timeout)?;
        std::fs::write(local_path, contents)
            .map_err(|e| PtpError::io_error(local_path.to_path_buf(), e))
    }
}

// Absent parameter counts as success
fn check_status(status: Option<u32>, context: &str) -> Result<()> {
    match status {
        Some(code) if code != 0 => Err(PtpError::protocol(context, code)),
        _ => Ok(()),
    }
}
