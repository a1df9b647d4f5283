//! `sitemap.xml` with Google image extensions.
//!
//! ```xml
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:image="...">
//!   <url><loc>https://example.com/index.html</loc></url>
//!   <url><loc>https://example.com/peru.html</loc>
//!     <image:image><image:loc>https://example.com/peru/a.jpg</image:loc></image:image>
//!   </url>
//! </urlset>
//! ```

use maud::html;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const IMAGE_NS: &str = "http://www.google.com/schemas/sitemap-image/1.1";

/// One gallery page and the images shown on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapGallery {
    pub gen_name: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Sitemap {
    root_url: String,
    galleries: Vec<SitemapGallery>,
}

/// Text content escaping, shared with the page templates.
fn escape(text: &str) -> String {
    html! { (text) }.into_string()
}

impl Sitemap {
    pub fn new(root_url: &str, galleries: Vec<SitemapGallery>) -> Self {
        Self {
            root_url: root_url.trim_end_matches('/').to_string(),
            galleries,
        }
    }

    fn url(&self, path: &str) -> String {
        escape(&format!("{}/{path}", self.root_url))
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<urlset xmlns="{SITEMAP_NS}" xmlns:image="{IMAGE_NS}">"#
        ));
        xml.push_str(&format!("<url><loc>{}</loc></url>", self.url("index.html")));
        for gallery in &self.galleries {
            xml.push_str(&format!(
                "<url><loc>{}</loc>",
                self.url(&format!("{}.html", gallery.gen_name))
            ));
            for image in &gallery.images {
                xml.push_str(&format!(
                    "<image:image><image:loc>{}</image:loc></image:image>",
                    self.url(&format!("{}/{image}", gallery.gen_name))
                ));
            }
            xml.push_str("</url>");
        }
        xml.push_str("</urlset>\n");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sitemap() -> Sitemap {
        Sitemap::new(
            "https://photos.example.com/",
            vec![
                SitemapGallery {
                    gen_name: "gallery1".into(),
                    images: vec!["image1.jpg".into(), "image2.jpg".into()],
                },
                SitemapGallery {
                    gen_name: "gallery2".into(),
                    images: vec!["image3.jpg".into()],
                },
            ],
        )
    }

    #[test]
    fn urlset_declares_namespaces() {
        let xml = sitemap().to_xml();
        assert!(xml.contains(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">"#
        ));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn root_and_gallery_entries() {
        let xml = sitemap().to_xml();
        assert!(xml.contains("<url><loc>https://photos.example.com/index.html</loc></url>"));
        assert!(xml.contains("<url><loc>https://photos.example.com/gallery1.html</loc>"));
        assert!(xml.contains(
            "<image:image><image:loc>https://photos.example.com/gallery1/image2.jpg</image:loc></image:image>"
        ));
        assert_eq!(xml.matches("<url>").count(), 3);
        assert_eq!(xml.matches("<image:image>").count(), 3);
    }

    #[test]
    fn is_well_formed_xml() {
        let xml = sitemap().to_xml();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(doc.root_element().tag_name().name(), "urlset");
    }

    #[test]
    fn special_characters_are_escaped() {
        let xml = Sitemap::new(
            "https://example.com",
            vec![SitemapGallery {
                gen_name: "a".into(),
                images: vec!["b&c.jpg".into()],
            }],
        )
        .to_xml();
        assert!(xml.contains("https://example.com/a/b&amp;c.jpg"));
    }

    #[test]
    fn markup_in_names_stays_well_formed() {
        let xml = Sitemap::new(
            "https://example.com",
            vec![SitemapGallery {
                gen_name: "a<b>".into(),
                images: vec!["\"x\".jpg".into()],
            }],
        )
        .to_xml();
        assert!(xml.contains("https://example.com/a&lt;b&gt;.html"));
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let locs: Vec<&str> = doc
            .descendants()
            .filter(|n| n.has_tag_name((IMAGE_NS, "loc")))
            .filter_map(|n| n.text())
            .collect();
        assert_eq!(locs, vec!["https://example.com/a<b>/\"x\".jpg"]);
    }
}
