//! Renderers for the structural documents of the package.
//!
//! Each document has a context struct implementing [`Template`]; rendering is
//! a pure function of that context. [`TemplateId`] names every template and
//! where its output lives in the container.

use std::fmt::Write;

use crate::book::{Identifier, ResolvedBook, Viewport};
use crate::markup::{escape_attribute, escape_numeric};
use crate::util::escape_xml;

use super::manifest::{ManifestItem, NavEntry};

pub const MIMETYPE: &str = "application/epub+zip";
pub const MIMETYPE_PATH: &str = "mimetype";
pub const CONTAINER_PATH: &str = "META-INF/container.xml";
pub const DISPLAY_OPTIONS_PATH: &str = "META-INF/com.apple.ibooks.display-options.xml";
pub const PACKAGE_PATH: &str = "OEBPS/content.opf";
pub const NAV_PATH: &str = "OEBPS/toc.html";
pub const NCX_PATH: &str = "OEBPS/toc.ncx";

/// Every template the packager knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Container,
    DisplayOptions,
    Package,
    Page,
    Nav,
    Ncx,
}

impl TemplateId {
    /// Fixed output path, for templates rendered once per book.
    pub fn path(self) -> Option<&'static str> {
        match self {
            TemplateId::Container => Some(CONTAINER_PATH),
            TemplateId::DisplayOptions => Some(DISPLAY_OPTIONS_PATH),
            TemplateId::Package => Some(PACKAGE_PATH),
            TemplateId::Nav => Some(NAV_PATH),
            TemplateId::Ncx => Some(NCX_PATH),
            TemplateId::Page => None,
        }
    }
}

/// A renderable document context.
pub trait Template {
    const ID: TemplateId;

    fn render(&self) -> String;
}

/// `META-INF/container.xml`
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerXml;

impl Template for ContainerXml {
    const ID: TemplateId = TemplateId::Container;

    fn render(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{PACKAGE_PATH}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
        )
    }
}

/// iBooks display options, written for fixed-layout books.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions;

impl Template for DisplayOptions {
    const ID: TemplateId = TemplateId::DisplayOptions;

    fn render(&self) -> String {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<display_options>
  <platform name="*">
    <option name="fixed-layout">true</option>
    <option name="open-to-spread">false</option>
  </platform>
</display_options>
"#
        .to_string()
    }
}

/// `OEBPS/content.opf`
#[derive(Debug, Clone, Copy)]
pub struct PackageDocument<'a> {
    pub book: &'a ResolvedBook,
    pub items: &'a [ManifestItem],
    /// Manifest ids of the pages, in reading order.
    pub spine: &'a [String],
    pub cover_id: Option<&'a str>,
}

impl Template for PackageDocument<'_> {
    const ID: TemplateId = TemplateId::Package;

    fn render(&self) -> String {
        let book = self.book;
        let mut opf = String::new();

        opf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        opf.push_str(
            "<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"BookId\"",
        );
        if book.viewport.is_some() {
            opf.push_str(" prefix=\"rendition: http://www.idpf.org/vocab/rendition/#\"");
        }
        if let Some(lang) = book.languages.first() {
            let _ = write!(opf, " xml:lang=\"{}\"", escape_xml(lang));
        }
        opf.push_str(">\n");

        opf.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
        let _ = writeln!(
            opf,
            "    <dc:identifier id=\"BookId\">{}</dc:identifier>",
            escape_xml(&book.identifier.urn())
        );
        if let Identifier::Isbn(_) = book.identifier {
            opf.push_str("    <meta refines=\"#BookId\" property=\"identifier-type\" scheme=\"onix:codelist5\">15</meta>\n");
        }
        let _ = writeln!(opf, "    <dc:title>{}</dc:title>", escape_xml(&book.title));
        for lang in &book.languages {
            let _ = writeln!(opf, "    <dc:language>{}</dc:language>", escape_xml(lang));
        }
        let _ = writeln!(opf, "    <dc:date>{}</dc:date>", escape_xml(&book.date));
        let _ = writeln!(
            opf,
            "    <meta property=\"dcterms:modified\">{}</meta>",
            escape_xml(&book.modified)
        );

        for (tag, people) in [("creator", &book.creators), ("contributor", &book.contributors)] {
            for (i, person) in people.iter().enumerate() {
                let id = format!("{tag}{}", i + 1);
                let _ = writeln!(
                    opf,
                    "    <dc:{tag} id=\"{id}\">{}</dc:{tag}>",
                    escape_xml(person.name())
                );
                if let Some(role) = person.role() {
                    let _ = writeln!(
                        opf,
                        "    <meta refines=\"#{id}\" property=\"role\" scheme=\"marc:relators\">{}</meta>",
                        escape_xml(role)
                    );
                }
                if let Some(file_as) = person.file_as() {
                    let _ = writeln!(
                        opf,
                        "    <meta refines=\"#{id}\" property=\"file-as\">{}</meta>",
                        escape_xml(file_as)
                    );
                }
            }
        }

        for subject in &book.subjects {
            let _ = writeln!(opf, "    <dc:subject>{}</dc:subject>", escape_xml(subject));
        }
        for publisher in &book.publishers {
            let _ = writeln!(opf, "    <dc:publisher>{}</dc:publisher>", escape_xml(publisher));
        }
        if let Some(description) = &book.description {
            let _ = writeln!(
                opf,
                "    <dc:description>{}</dc:description>",
                escape_xml(description)
            );
        }
        if let Some(rights) = &book.rights {
            let _ = writeln!(opf, "    <dc:rights>{}</dc:rights>", escape_xml(rights));
        }
        if let Some(cover_id) = self.cover_id {
            let _ = writeln!(
                opf,
                "    <meta name=\"cover\" content=\"{}\"/>",
                escape_xml(cover_id)
            );
        }
        if book.viewport.is_some() {
            opf.push_str("    <meta property=\"rendition:layout\">pre-paginated</meta>\n");
            opf.push_str("    <meta property=\"rendition:orientation\">auto</meta>\n");
            opf.push_str("    <meta property=\"rendition:spread\">none</meta>\n");
        }
        opf.push_str("  </metadata>\n");

        opf.push_str("  <manifest>\n");
        for item in self.items {
            let _ = write!(
                opf,
                "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"",
                escape_xml(&item.id),
                escape_xml(&item.href),
                escape_xml(&item.media_type)
            );
            if let Some(properties) = &item.properties {
                let _ = write!(opf, " properties=\"{}\"", escape_xml(properties));
            }
            opf.push_str("/>\n");
        }
        opf.push_str("  </manifest>\n");

        opf.push_str("  <spine toc=\"ncx\">\n");
        for idref in self.spine {
            let _ = writeln!(opf, "    <itemref idref=\"{}\"/>", escape_xml(idref));
        }
        opf.push_str("  </spine>\n");
        opf.push_str("</package>\n");
        opf
    }
}

/// One content page, `OEBPS/eNNNNN.html`.
#[derive(Debug, Clone, Copy)]
pub struct PageDocument<'a> {
    pub title: &'a str,
    pub language: &'a str,
    /// Already-serialized XHTML body content.
    pub body: &'a str,
    pub styles: &'a [String],
    pub scripts: &'a [String],
    pub viewport: Option<Viewport>,
}

impl Template for PageDocument<'_> {
    const ID: TemplateId = TemplateId::Page;

    fn render(&self) -> String {
        let mut html = xhtml_open(self.language);
        html.push_str("<head>\n  <meta charset=\"UTF-8\" />\n");
        let _ = writeln!(html, "  <title>{}</title>", escape_numeric(self.title));
        if let Some(viewport) = self.viewport {
            let _ = writeln!(
                html,
                "  <meta name=\"viewport\" content=\"width={}, height={}\" />",
                viewport.width, viewport.height
            );
        }
        push_style_links(&mut html, self.styles);
        for src in self.scripts {
            let _ = writeln!(
                html,
                "  <script type=\"text/javascript\" src=\"{}\"></script>",
                escape_attribute(src)
            );
        }
        html.push_str("</head>\n<body>\n");
        html.push_str(self.body);
        html.push_str("\n</body>\n</html>\n");
        html
    }
}

/// The navigation document, `OEBPS/toc.html`.
#[derive(Debug, Clone, Copy)]
pub struct NavDocument<'a> {
    pub title: &'a str,
    pub language: &'a str,
    pub entries: &'a [NavEntry],
    pub styles: &'a [String],
}

impl Template for NavDocument<'_> {
    const ID: TemplateId = TemplateId::Nav;

    fn render(&self) -> String {
        let mut html = xhtml_open(self.language);
        html.push_str("<head>\n  <meta charset=\"UTF-8\" />\n");
        let _ = writeln!(html, "  <title>{}</title>", escape_numeric(self.title));
        push_style_links(&mut html, self.styles);
        html.push_str("</head>\n<body>\n  <nav epub:type=\"toc\" id=\"toc\">\n");
        let _ = writeln!(html, "    <h1>{}</h1>", escape_numeric(self.title));
        html.push_str("    <ol>\n");
        for entry in self.entries {
            let _ = writeln!(
                html,
                "      <li id=\"toc-{}\"><a href=\"{}\">{}</a></li>",
                entry.index,
                escape_attribute(&entry.href),
                escape_numeric(&entry.label)
            );
        }
        html.push_str("    </ol>\n  </nav>\n</body>\n</html>\n");
        html
    }
}

/// The legacy navigation control file, `OEBPS/toc.ncx`.
#[derive(Debug, Clone, Copy)]
pub struct NcxDocument<'a> {
    pub uid: &'a str,
    pub title: &'a str,
    pub entries: &'a [NavEntry],
}

impl Template for NcxDocument<'_> {
    const ID: TemplateId = TemplateId::Ncx;

    fn render(&self) -> String {
        let mut ncx = String::new();
        ncx.push_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
"#,
        );
        let _ = writeln!(
            ncx,
            "    <meta name=\"dtb:uid\" content=\"{}\"/>",
            escape_xml(self.uid)
        );
        ncx.push_str(
            r#"    <meta name="dtb:depth" content="1"/>
    <meta name="dtb:totalPageCount" content="0"/>
    <meta name="dtb:maxPageNumber" content="0"/>
  </head>
"#,
        );
        let _ = writeln!(
            ncx,
            "  <docTitle>\n    <text>{}</text>\n  </docTitle>",
            escape_xml(self.title)
        );
        ncx.push_str("  <navMap>\n");
        for entry in self.entries {
            let _ = writeln!(
                ncx,
                "    <navPoint id=\"navPoint-{0}\" playOrder=\"{0}\">\n      <navLabel><text>{1}</text></navLabel>\n      <content src=\"{2}\"/>\n    </navPoint>",
                entry.index,
                escape_xml(&entry.label),
                escape_xml(&entry.href)
            );
        }
        ncx.push_str("  </navMap>\n</ncx>\n");
        ncx
    }
}

fn xhtml_open(language: &str) -> String {
    let lang = escape_attribute(language);
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" xml:lang=\"{lang}\" lang=\"{lang}\">\n"
    )
}

fn push_style_links(html: &mut String, styles: &[String]) {
    for href in styles {
        let _ = writeln!(
            html,
            "  <link rel=\"stylesheet\" type=\"text/css\" href=\"{}\" />",
            escape_attribute(href)
        );
    }
}
