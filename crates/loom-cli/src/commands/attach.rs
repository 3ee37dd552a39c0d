//! /attach command - queue a file for the next message

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use loom_protocol::{Attachment, AttachmentKind};

use super::CommandResult;

pub struct AttachCommand;

impl AttachCommand {
    pub fn execute(args: &str) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message("Usage: /attach <path>".to_string());
        }
        match load_attachment(Path::new(args)) {
            Ok(attachment) => CommandResult::Attach(attachment),
            Err(e) => CommandResult::Message(format!("Cannot attach {}: {}", args, e)),
        }
    }
}

/// Read a file into a base64 attachment, typed by its extension
pub fn load_attachment(path: &Path) -> std::io::Result<Attachment> {
    let bytes = fs::read(path)?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Attachment::new(
        AttachmentKind::for_mime(&mime_type),
        name,
        mime_type,
        STANDARD.encode(bytes),
    ))
}
