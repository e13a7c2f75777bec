use super::ContentExtractor;
use crate::error::ExtractError;

/// Extracts the text of every page of a PDF, in document order
#[derive(Debug, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for PdfExtractor {
    fn extensions(&self) -> &[&'static str] {
        &["pdf"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(extract_pages(bytes)?.concat())
    }
}

/// Text of each page; pages without extractable text yield an empty string
fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::ParseFailed(e.to_string()))?;
    tracing::debug!("Extracted {} PDF pages", pages.len());
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Build a PDF whose pages carry the given text; `None` makes a page with no content stream
    fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
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

        let mut kids = Vec::new();
        for page_text in pages {
            let page_id = match page_text {
                Some(text) => {
                    let content = Content {
                        operations: vec![
                            Operation::new("BT", vec![]),
                            Operation::new("Tf", vec!["F1".into(), 24.into()]),
                            Operation::new("Td", vec![100.into(), 600.into()]),
                            Operation::new("Tj", vec![Object::string_literal(*text)]),
                            Operation::new("ET", vec![]),
                        ],
                    };
                    let content_id =
                        doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
                    doc.add_object(dictionary! {
                        "Type" => "Page",
                        "Parent" => pages_id,
                        "Contents" => content_id,
                    })
                }
                None => doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                }),
            };
            kids.push(page_id.into());
        }

        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extracts_text_in_page_order() {
        let bytes = build_pdf(&[Some("Alpha"), Some("Bravo")]);
        let text = PdfExtractor::new().extract(&bytes).unwrap();

        let alpha = text.find("Alpha").expect("first page text");
        let bravo = text.find("Bravo").expect("second page text");
        assert!(alpha < bravo);
    }

    #[test]
    fn test_page_without_text_contributes_nothing() {
        let bytes = build_pdf(&[Some("Alpha"), None, Some("Charlie")]);
        let pages = extract_pages(&bytes).unwrap();

        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("Alpha"));
        assert!(pages[1].trim().is_empty());
        assert!(pages[2].contains("Charlie"));
    }

    #[test]
    fn test_invalid_pdf_bytes() {
        let result = PdfExtractor::new().extract(b"definitely not a pdf");
        assert!(matches!(result, Err(ExtractError::ParseFailed(_))));
    }

    #[test]
    fn test_registered_for_pdf() {
        assert_eq!(PdfExtractor::new().extensions(), &["pdf"]);
    }
}
