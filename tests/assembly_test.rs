use std::io::{Cursor, Read};

use folio::{Assembly, BookSpec, BuildConfig, BuildOutput, PageSpec, Stage, build_epub};
use quick_xml::Reader;
use quick_xml::events::Event;
use zip::{CompressionMethod, ZipArchive};

const COVER: &str = "data:image/png;base64,iVBORw0KGgo=";

fn sample_book() -> BookSpec {
    BookSpec::new("Sample & Co", COVER)
        .with_creator("A. Writer")
        .with_css("p { margin: 0 }")
        .with_page(PageSpec::new(
            r#"<h1>Opening</h1><p>Caf&eacute; <img src="data:image/gif;base64,R0lGODlhAQABAAAAACw="></p><a name="here"></a>"#,
        ))
        .with_page(PageSpec::new("<h2>Second</h2><br><hr>"))
}

async fn build_in_memory(spec: BookSpec) -> ZipArchive<Cursor<Vec<u8>>> {
    match build_epub(spec, BuildConfig::memory()).await.unwrap() {
        BuildOutput::Bytes(bytes) => ZipArchive::new(Cursor::new(bytes)).unwrap(),
        other => panic!("expected bytes, got {other:?}"),
    }
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut text = String::new();
    archive
        .by_name(name)
        .unwrap_or_else(|_| panic!("missing {name}"))
        .read_to_string(&mut text)
        .unwrap();
    text
}

/// `(id, href, media-type, properties)` of every manifest item.
fn manifest_items(opf: &str) -> Vec<(String, String, String, Option<String>)> {
    let mut reader = Reader::from_str(opf);
    let mut items = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"item" => {
                let mut item = (String::new(), String::new(), String::new(), None);
                for attr in e.attributes() {
                    let attr = attr.unwrap();
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"id" => item.0 = value,
                        b"href" => item.1 = value,
                        b"media-type" => item.2 = value,
                        b"properties" => item.3 = Some(value),
                        _ => {}
                    }
                }
                items.push(item);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    items
}

#[tokio::test]
async fn test_mimetype_is_first_and_stored() {
    let mut archive = build_in_memory(sample_book()).await;

    let mut first = archive.by_index(0).unwrap();
    assert_eq!(first.name(), "mimetype");
    assert_eq!(first.compression(), CompressionMethod::Stored);
    let mut payload = String::new();
    first.read_to_string(&mut payload).unwrap();
    assert_eq!(payload, "application/epub+zip");
}

#[tokio::test]
async fn test_archive_layout() {
    let archive = build_in_memory(sample_book()).await;
    let names: Vec<_> = archive.file_names().map(str::to_string).collect();

    for expected in [
        "META-INF/container.xml",
        "OEBPS/content.opf",
        "OEBPS/toc.html",
        "OEBPS/toc.ncx",
        "OEBPS/e00000.html",
        "OEBPS/e00001.html",
        "OEBPS/styles/css_0.css",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    assert!(
        !names.iter().any(|n| n.contains("display-options")),
        "reflowable books carry no display options"
    );
    assert_eq!(
        names.iter().filter(|n| n.starts_with("OEBPS/assets/")).count(),
        2
    );
}

#[tokio::test]
async fn test_manifest_and_spine() {
    let mut archive = build_in_memory(sample_book()).await;
    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    let items = manifest_items(&opf);

    let ids: Vec<_> = items.iter().map(|i| i.0.as_str()).collect();
    assert_eq!(ids[0], "cover-image");
    assert_eq!(&ids[ids.len() - 4..], ["e00000", "e00001", "toc", "ncx"]);

    let cover = &items[0];
    assert_eq!(cover.2, "image/png");
    assert_eq!(cover.3.as_deref(), Some("cover-image"));

    let nav = items.iter().find(|i| i.0 == "toc").unwrap();
    assert_eq!(nav.1, "toc.html");
    assert_eq!(nav.3.as_deref(), Some("nav"));

    // Every manifest href exists in the archive.
    for (_, href, _, _) in &items {
        assert!(
            archive.by_name(&format!("OEBPS/{href}")).is_ok(),
            "dangling href {href}"
        );
    }

    assert!(opf.contains(r#"<itemref idref="e00000"/>"#));
    assert!(opf.contains("<dc:title>Sample &amp; Co</dc:title>"));
    assert!(opf.contains(r#"<dc:creator id="creator1">A. Writer</dc:creator>"#));
    assert!(opf.contains(r#"<meta name="cover" content="cover-image"/>"#));
    assert!(opf.contains("<dc:language>en-US</dc:language>"));
}

#[tokio::test]
async fn test_nav_falls_back_to_first_page() {
    let mut archive = build_in_memory(sample_book()).await;

    let nav = read_entry(&mut archive, "OEBPS/toc.html");
    assert_eq!(nav.matches("<li ").count(), 1);
    assert!(nav.contains(r#"<a href="e00000.html">Opening</a>"#));

    let ncx = read_entry(&mut archive, "OEBPS/toc.ncx");
    assert_eq!(ncx.matches("<navPoint ").count(), 1);
    assert!(ncx.contains(r#"<content src="e00000.html"/>"#));
}

#[tokio::test]
async fn test_flagged_pages_form_the_toc() {
    let spec = BookSpec::new("T", COVER)
        .with_page(PageSpec::new("<p>a</p>"))
        .with_page(PageSpec::new("<p>b</p>").in_toc().with_title("Bee"))
        .with_page(PageSpec::new("<h3>See</h3>").in_toc());
    let mut archive = build_in_memory(spec).await;

    let ncx = read_entry(&mut archive, "OEBPS/toc.ncx");
    assert!(ncx.contains(r#"<navPoint id="navPoint-1" playOrder="1">"#));
    assert!(ncx.contains("<text>Bee</text>"));
    assert!(ncx.contains(r#"<navPoint id="navPoint-2" playOrder="2">"#));
    assert!(ncx.contains("<text>See</text>"));
    assert!(!ncx.contains("e00000.html"));
}

#[tokio::test]
async fn test_page_markup_is_normalized() {
    let mut archive = build_in_memory(sample_book()).await;

    let first = read_entry(&mut archive, "OEBPS/e00000.html");
    assert!(first.contains("<p>Caf&#233; <img src=\"assets/"));
    assert!(first.contains(r#"<a id="here" />"#));
    assert!(first.contains(r#"<link rel="stylesheet" type="text/css" href="styles/css_0.css" />"#));
    assert!(!first.contains("data:image/gif"));

    let second = read_entry(&mut archive, "OEBPS/e00001.html");
    assert!(second.contains("<br /><hr />"));
}

#[tokio::test]
async fn test_scripts_mark_pages_scripted() {
    let spec = sample_book().with_js("document.title = 'x';");
    let mut archive = build_in_memory(spec).await;

    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    let items = manifest_items(&opf);
    let page = items.iter().find(|i| i.0 == "e00001").unwrap();
    assert_eq!(page.3.as_deref(), Some("scripted"));
    let script = items.iter().find(|i| i.0 == "js_0").unwrap();
    assert_eq!(script.1, "scripts/js_0.js");

    let html = read_entry(&mut archive, "OEBPS/e00001.html");
    assert!(html.contains(r#"<script type="text/javascript" src="scripts/js_0.js"></script>"#));
}

#[tokio::test]
async fn test_fixed_layout_package() {
    let spec = sample_book().with_fixed_format(600, 800);
    let mut archive = build_in_memory(spec).await;

    let display = read_entry(&mut archive, "META-INF/com.apple.ibooks.display-options.xml");
    assert!(display.contains(r#"<option name="fixed-layout">true</option>"#));

    let opf = read_entry(&mut archive, "OEBPS/content.opf");
    assert!(opf.contains(r#"<meta property="rendition:layout">pre-paginated</meta>"#));

    let page = read_entry(&mut archive, "OEBPS/e00000.html");
    assert!(page.contains(r#"content="width=600, height=800""#));
    let rule = read_entry(&mut archive, "OEBPS/styles/css_0.css");
    assert!(rule.contains("width: 600px"));
}

#[tokio::test]
async fn test_filesystem_build_and_clean() {
    let temp = tempfile::tempdir().unwrap();
    let target = temp.path().join("books").join("sample.epub");

    let mut assembly = Assembly::new(sample_book(), BuildConfig::for_path(&target)).unwrap();
    let output = assembly.build().await.unwrap();
    assert_eq!(output, BuildOutput::Archive(target.clone()));
    assert!(target.is_file());

    let tree = temp.path().join("books").join(assembly.build_id());
    assert!(tree.join("OEBPS").join("content.opf").is_file());

    let file = std::fs::File::open(&target).unwrap();
    let mut archive = ZipArchive::new(file).unwrap();
    assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");

    assembly.clean().await.unwrap();
    assert_eq!(assembly.stage(), Stage::Cleaned);
    assert!(!target.exists());
    assert!(!tree.exists());
}

#[tokio::test]
async fn test_unarchived_build_leaves_tree() {
    let temp = tempfile::tempdir().unwrap();

    let config = BuildConfig::filesystem(temp.path()).with_archive(false);
    let output = build_epub(sample_book(), config).await.unwrap();

    let BuildOutput::Tree(tree) = output else {
        panic!("expected a tree, got {output:?}");
    };
    assert_eq!(
        std::fs::read_to_string(tree.join("mimetype")).unwrap(),
        "application/epub+zip"
    );
    assert!(tree.join("OEBPS").join("e00001.html").is_file());
    let epubs = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "epub"))
        .count();
    assert_eq!(epubs, 0);
}

#[tokio::test]
async fn test_default_archive_name_is_build_id() {
    let temp = tempfile::tempdir().unwrap();

    let mut assembly = Assembly::new(sample_book(), BuildConfig::filesystem(temp.path())).unwrap();
    let output = assembly.build().await.unwrap();
    assert_eq!(
        output,
        BuildOutput::Archive(temp.path().join(format!("{}.epub", assembly.build_id())))
    );
}

fn assert_well_formed(xml: &str) {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("ill-formed document: {e}\n{xml}"),
        }
    }
}

#[tokio::test]
async fn test_local_page_keeps_empty_anchor_closed() {
    let temp = tempfile::tempdir().unwrap();
    let page = temp.path().join("page.html");
    std::fs::write(
        &page,
        r#"<html><body><a name="top"></a><p>Hello</p></body></html>"#,
    )
    .unwrap();

    let spec = BookSpec::new("Local", COVER)
        .with_page(PageSpec::new(format!("file://{}", page.display())));
    let mut archive = build_in_memory(spec).await;

    let html = read_entry(&mut archive, "OEBPS/e00000.html");
    assert!(html.contains(r#"<a id="top" /><p>Hello</p>"#), "{html}");
    assert_well_formed(&html);
}

#[tokio::test]
async fn test_inline_script_and_comment_are_well_formed() {
    let spec = BookSpec::new("Script", COVER).with_page(PageSpec::new(
        "<p>x</p><!-- a -- b --><script>if (a < b && c) {}</script><style>p > a { }</style>",
    ));
    let mut archive = build_in_memory(spec).await;

    let html = read_entry(&mut archive, "OEBPS/e00000.html");
    assert!(html.contains("<script>if (a &#60; b &#38;&#38; c) {}</script>"));
    assert_well_formed(&html);
}
