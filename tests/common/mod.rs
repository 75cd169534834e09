#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use pdf_chat::config::Config;
use pdf_chat::dispatch::{CompletionBackend, ProviderRequest, ProviderResult};
use pdf_chat::error::{ProviderError, ProviderErrorKind};

/// Scripted behaviour for one candidate.
#[derive(Clone, Debug)]
pub enum Reply {
    Answer(&'static str),
    Fail(ProviderErrorKind, &'static str),
    /// Never answers; only the gateway's attempt timeout ends it.
    Hang,
}

/// Deterministic backend that records every attempt it receives.
#[derive(Default)]
pub struct MockBackend {
    replies: HashMap<String, Reply>,
    unavailable: Vec<String>,
    calls: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(replies: &[(&str, Reply)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(name, reply)| (name.to_string(), reply.clone()))
                .collect(),
            ..Default::default()
        }
    }

    /// Mark candidates as lacking credentials.
    pub fn without_credentials(mut self, candidates: &[&str]) -> Self {
        self.unavailable = candidates.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(
        &self,
        candidate: &str,
        req: &ProviderRequest,
    ) -> Result<ProviderResult, ProviderError> {
        self.calls.lock().unwrap().push(candidate.to_string());
        self.prompts.lock().unwrap().push(req.prompt.clone());

        match self.replies.get(candidate) {
            Some(Reply::Answer(text)) => Ok(ProviderResult {
                text: text.to_string(),
                model: candidate.to_string(),
                provider: "mock".to_string(),
            }),
            Some(Reply::Fail(kind, detail)) => Err(ProviderError::new(candidate, *kind, *detail)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::new(
                    candidate,
                    ProviderErrorKind::UnknownProviderError,
                    "woke up",
                ))
            }
            None => Err(ProviderError::new(
                candidate,
                ProviderErrorKind::InvalidRequest,
                "unscripted candidate",
            )),
        }
    }

    fn is_available(&self, candidate: &str) -> bool {
        !self.unavailable.iter().any(|c| c == candidate)
    }
}

/// Config with the given candidate order and a short attempt timeout.
pub fn test_config(candidates: &[&str]) -> Config {
    let mut config = Config::default();
    config.gateway.candidates = candidates.iter().map(|c| c.to_string()).collect();
    config.gateway.attempt_timeout_secs = 1;
    config
}

/// Minimal PDF with one text line per page.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages, None)
}

/// Valid PDF whose encoded size is exactly `size` bytes, grown with an
/// unreferenced filler stream.
pub fn pdf_of_size(pages: &[&str], size: usize) -> Vec<u8> {
    let base = build_pdf(pages, Some(0)).len();
    assert!(size > base, "{size} is smaller than the bare document ({base})");
    let mut filler = size - base;
    // Length digits and xref offsets shift with the filler; converge.
    for _ in 0..16 {
        let bytes = build_pdf(pages, Some(filler));
        match bytes.len().cmp(&size) {
            std::cmp::Ordering::Equal => return bytes,
            std::cmp::Ordering::Less => filler += size - bytes.len(),
            std::cmp::Ordering::Greater => filler -= bytes.len() - size,
        }
    }
    panic!("could not build a PDF of exactly {size} bytes");
}

fn build_pdf(pages: &[&str], filler: Option<usize>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(pages.len() as i64),
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(len) = filler {
        doc.add_object(Stream::new(dictionary! {}, vec![b'%'; len]));
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
