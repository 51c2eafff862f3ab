use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use pdf_rag_core::{
    build_index, context_preview, AnswerEngine, CharacterNgramEmbedder, Embedder, Generator,
    IngestError, LopdfExtractor, PageRecognizer, PipelineOptions, SearchError, StackCell,
    CONTEXT_PREVIEW_CHARS,
};
use std::cell::RefCell;
use std::path::Path;
use tempfile::tempdir;

const PAGE_ONE: &str = "The roof truss spans 12 meters.";
const PAGE_TWO_SCAN: &str = "Load capacity is 500 kilograms per square meter.";

/// Stands in for OCR: page 2 is the "scanned" page.
#[derive(Default)]
struct ScannedPageRecognizer {
    calls: RefCell<Vec<u32>>,
}

impl PageRecognizer for ScannedPageRecognizer {
    fn recognize(&self, _pdf_path: &Path, page_number: u32) -> Result<String, IngestError> {
        self.calls.borrow_mut().push(page_number);
        if page_number == 2 {
            Ok(format!("  {PAGE_TWO_SCAN}\n"))
        } else {
            Ok(String::new())
        }
    }
}

struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String, SearchError> {
        Ok(format!("echo: {}", prompt.len()))
    }
}

fn text_page(doc: &mut Document, pages_id: ObjectId, resources_id: ObjectId, text: Option<&str>) -> ObjectId {
    let operations = match text {
        Some(text) => vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
        None => Vec::new(),
    };
    let content = Content { operations }
        .encode()
        .expect("content should encode");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    })
}

fn write_two_page_pdf(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let first = text_page(&mut doc, pages_id, resources_id, Some(PAGE_ONE));
    let second = text_page(&mut doc, pages_id, resources_id, None);

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![first.into(), second.into()],
            "Count" => 2,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("pdf should save");
}

fn options_in(dir: &Path) -> PipelineOptions {
    PipelineOptions {
        chunk_size: 1_500,
        chunk_overlap: 200,
        top_k: 1,
        ..PipelineOptions::default()
    }
    .with_index_dir(dir.join("indexes"))
}

#[tokio::test]
async fn scanned_page_is_recognized_indexed_and_cited() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let pdf = dir.path().join("guide.pdf");
    write_two_page_pdf(&pdf);
    let options = options_in(dir.path());

    let recognizer = ScannedPageRecognizer::default();
    let extractor = LopdfExtractor::new(&recognizer);
    let report = build_index(&pdf, &extractor, &CharacterNgramEmbedder::default(), &options)?;

    assert_eq!(recognizer.calls.borrow().as_slice(), &[2]);
    assert_eq!(report.total_pages, 2);
    assert_eq!(report.text_layer_pages, vec![1]);
    assert_eq!(report.recognized_pages, vec![2]);
    assert!(report.dropped_pages.is_empty());
    assert_eq!(report.chunk_count, 2);

    let stack = StackCell::new();
    let engine = stack.get_or_load(|| {
        AnswerEngine::load(&options, CharacterNgramEmbedder::default(), EchoGenerator)
    })?;

    let answer = engine.answer("What is the load capacity?").await?;
    assert_eq!(answer.retrieved.len(), 1);
    assert_eq!(answer.retrieved[0].page_number(), 2);
    assert!(answer.retrieved[0].text().contains("500 kilograms"));
    assert_eq!(answer.context, format!("[page 2] {PAGE_TWO_SCAN}"));
    assert_eq!(context_preview(&answer.context, CONTEXT_PREVIEW_CHARS), answer.context);

    let roof = engine.prepare("How far does the roof truss span?")?;
    assert_eq!(roof.retrieved[0].page_number(), 1);
    assert_eq!(roof.retrieved[0].text(), PAGE_ONE);
    Ok(())
}

#[test]
fn k_above_chunk_count_returns_all_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let pdf = dir.path().join("guide.pdf");
    write_two_page_pdf(&pdf);
    let options = PipelineOptions {
        top_k: 10,
        ..options_in(dir.path())
    };

    let recognizer = ScannedPageRecognizer::default();
    build_index(
        &pdf,
        &LopdfExtractor::new(&recognizer),
        &CharacterNgramEmbedder::default(),
        &options,
    )?;

    let engine = AnswerEngine::load(&options, CharacterNgramEmbedder::default(), EchoGenerator)?;
    let prepared = engine.prepare("load")?;
    assert_eq!(prepared.retrieved.len(), 2);
    assert!(prepared.retrieved[0].distance <= prepared.retrieved[1].distance);
    Ok(())
}

#[test]
fn query_with_other_model_is_refused_at_load() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let pdf = dir.path().join("guide.pdf");
    write_two_page_pdf(&pdf);
    let options = options_in(dir.path());

    let recognizer = ScannedPageRecognizer::default();
    build_index(
        &pdf,
        &LopdfExtractor::new(&recognizer),
        &CharacterNgramEmbedder::default(),
        &options,
    )?;

    let other = CharacterNgramEmbedder::from_model_id("char-4gram-256")?;
    assert_ne!(other.model_id(), CharacterNgramEmbedder::default().model_id());
    let result = AnswerEngine::load(&options, other, EchoGenerator);
    assert!(matches!(result, Err(SearchError::Artifact(_))));
    Ok(())
}

#[test]
fn corrupt_pdf_aborts_build_without_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let pdf = dir.path().join("broken.pdf");
    std::fs::write(&pdf, b"%PDF-1.4\n%broken")?;
    let options = options_in(dir.path());

    let recognizer = ScannedPageRecognizer::default();
    let result = build_index(
        &pdf,
        &LopdfExtractor::new(&recognizer),
        &CharacterNgramEmbedder::default(),
        &options,
    );

    assert!(result.is_err());
    assert!(!options.index_path().exists());
    assert!(!options.metadata_path().exists());
    Ok(())
}
