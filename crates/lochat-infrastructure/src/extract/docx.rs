//! DOCX text extraction.
//!
//! A .docx file is a zip archive whose main body lives in
//! `word/document.xml`. The text content is the concatenation of `w:t`
//! runs; paragraphs (`w:p`) become lines, explicit tabs and breaks are
//! mapped to their characters.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use lochat_core::error::{ChatError, Result};

pub fn extract(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ChatError::parse_failure("DOCX", format!("Not a zip archive: {}", e)))?;

    let mut document = archive
        .by_name("word/document.xml")
        .map_err(|e| ChatError::parse_failure("DOCX", format!("Missing document body: {}", e)))?;

    let mut xml = String::new();
    document
        .read_to_string(&mut xml)
        .map_err(|e| ChatError::parse_failure("DOCX", format!("Unreadable document body: {}", e)))?;

    document_text(&xml)
}

/// Walks the document XML and collects run text, one line per paragraph.
fn document_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut output = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => output.push('\t'),
                b"w:br" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let text = t
                    .decode()
                    .map_err(|e| ChatError::parse_failure("DOCX", e.to_string()))?;
                output.push_str(&text);
            }
            Ok(Event::GeneralRef(e)) if in_text_run => {
                let resolved = e
                    .resolve_char_ref()
                    .map_err(|err| ChatError::parse_failure("DOCX", err.to_string()))?;
                match resolved {
                    Some(ch) => output.push(ch),
                    None => match &*e {
                        b"amp" => output.push('&'),
                        b"lt" => output.push('<'),
                        b"gt" => output.push('>'),
                        b"apos" => output.push('\''),
                        b"quot" => output.push('"'),
                        _ => {}
                    },
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ChatError::parse_failure("DOCX", e.to_string())),
            _ => {}
        }
    }

    Ok(output.trim_end().to_string())
}
