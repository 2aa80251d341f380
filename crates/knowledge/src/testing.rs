//! Test fixtures, shared with downstream crates through the `test-util` feature.

use async_trait::async_trait;
use docqa_core::AppResult;
use docqa_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::Mutex;

/// Write a PDF with one text line per page.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    build_pdf(pages, "F1", true).save(path).unwrap();
}

/// In-memory bytes of the PDF [`write_pdf`] would write.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut bytes = Vec::new();
    build_pdf(pages, "F1", true).save_to(&mut bytes).unwrap();
    bytes
}

/// Write a one-page PDF whose text uses a font absent from any resources.
pub fn write_pdf_missing_font(path: &Path, text: &str) {
    build_pdf(&[text], "F9", false).save(path).unwrap();
}

fn build_pdf(pages: &[&str], font: &str, with_resources: bool) -> Document {
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
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font.into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if with_resources {
            page.set("Resources", resources_id);
        }
        let page_id = doc.add_object(page);
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let mut pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    if with_resources {
        pages_dict.set("Resources", resources_id);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Language model that answers with a fixed template and records prompts.
pub struct ScriptedLlm {
    reply: Box<dyn Fn(&str) -> String + Send + Sync>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(reply: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(LlmResponse {
            content: (self.reply)(&request.prompt),
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}
