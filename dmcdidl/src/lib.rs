//! # dmcdidl - DIDL-Lite parsing and construction
//!
//! DIDL-Lite is the XML dialect UPnP uses to describe content items. This
//! crate covers the two directions the controller needs:
//!
//! - parsing ContentDirectory search payloads into [`DidlItem`]s, keeping the
//!   original `<res>` element verbatim (renderers are picky about its
//!   attributes), and
//! - building the `CurrentURIMetaData` DIDL-Lite wrapper sent along with
//!   `SetAVTransportURI`.

use std::io::BufReader;
use uuid::Uuid;
use xmltree::{Element, EmitterConfig, XMLNode};

pub const NAMESPACE_DIDL: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
pub const NAMESPACE_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NAMESPACE_UPNP: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";

#[derive(Debug, thiserror::Error)]
pub enum DidlError {
    #[error("XML parse error: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("XML write error: {0}")]
    Write(#[from] xmltree::Error),

    #[error("Not a DIDL-Lite document (root element {0})")]
    NotDidl(String),
}

/// A parsed DIDL-Lite document, reduced to its playable items.
///
/// Containers returned by a Search are ignored; the controller only ever
/// plays items.
#[derive(Debug, Clone)]
pub struct DidlDocument {
    items: Vec<DidlItem>,
}

impl DidlDocument {
    /// Parses a DIDL-Lite payload.
    pub fn parse(xml: &str) -> Result<Self, DidlError> {
        let root = Element::parse(BufReader::new(xml.as_bytes()))?;
        if root.name != "DIDL-Lite" {
            return Err(DidlError::NotDidl(root.name));
        }

        let items = root
            .children
            .iter()
            .filter_map(|node| match node {
                XMLNode::Element(elem) if elem.name == "item" => {
                    Some(DidlItem::from_element(elem.clone()))
                }
                _ => None,
            })
            .collect();

        Ok(Self { items })
    }

    pub fn items(&self) -> &[DidlItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One `<item>` from a search result.
///
/// The underlying element is kept as parsed so the `<res>` subtree can be
/// re-emitted with its attributes intact.
#[derive(Debug, Clone)]
pub struct DidlItem {
    element: Element,
}

impl DidlItem {
    pub fn from_element(element: Element) -> Self {
        Self { element }
    }

    pub fn title(&self) -> Option<String> {
        self.child_text("title")
    }

    pub fn creator(&self) -> Option<String> {
        self.child_text("creator")
    }

    pub fn artist(&self) -> Option<String> {
        self.child_text("artist")
    }

    pub fn actor(&self) -> Option<String> {
        self.child_text("actor")
    }

    pub fn author(&self) -> Option<String> {
        self.child_text("author")
    }

    pub fn upnp_class(&self) -> Option<String> {
        self.child_text("class")
    }

    /// Playback URL, i.e. the text of the first `<res>` element.
    pub fn url(&self) -> Option<String> {
        self.child_text("res")
    }

    /// The `<res>` element with its namespace prefix stripped and all
    /// attributes preserved. Some renderers reject prefixed `<res>` tags in
    /// `CurrentURIMetaData`, so the prefix and its xmlns declaration must go.
    pub fn res_element(&self) -> Option<Element> {
        let res = self.find_child("res")?;

        let mut cleaned = Element::new("res");
        for (name, value) in &res.attributes {
            cleaned.attributes.insert(name.clone(), value.clone());
        }
        if let Some(text) = res.get_text() {
            cleaned.children.push(XMLNode::Text(text.into_owned()));
        }
        Some(cleaned)
    }

    /// The cleaned `<res>` element serialized as a string.
    pub fn res_as_string(&self) -> Option<String> {
        let elem = self.res_element()?;
        write_fragment(&elem).ok()
    }

    fn find_child(&self, name: &str) -> Option<&Element> {
        self.element.children.iter().find_map(|node| match node {
            XMLNode::Element(elem) if elem.name == name => Some(elem),
            _ => None,
        })
    }

    fn child_text(&self, name: &str) -> Option<String> {
        self.find_child(name)
            .and_then(|e| e.get_text())
            .map(|t| t.into_owned())
    }
}

/// Builds the DIDL-Lite metadata wrapper for one item.
///
/// The result is *unescaped* XML; it gets escaped exactly once when the SOAP
/// layer serializes it as the text value of `CurrentURIMetaData`.
///
/// Text fields are transliterated ([`recode_german`]) because several
/// renderers garble umlauts in on-screen display. The `<res>` element is
/// carried over verbatim (attributes intact, prefix stripped); its URL is
/// deliberately *not* transliterated.
pub fn build_item_metadata(item: &DidlItem) -> Result<String, DidlError> {
    let mut item_elem = Element::new("item");
    item_elem
        .attributes
        .insert("id".to_string(), Uuid::new_v4().to_string());
    item_elem
        .attributes
        .insert("parentID".to_string(), Uuid::new_v4().to_string());
    item_elem
        .attributes
        .insert("restricted".to_string(), "1".to_string());

    push_text_child(&mut item_elem, "dc:title", item.title());
    push_text_child(&mut item_elem, "dc:creator", item.creator());
    push_text_child(&mut item_elem, "upnp:author", item.author());
    push_text_child(&mut item_elem, "upnp:actor", item.actor());
    push_text_child(&mut item_elem, "upnp:artist", item.artist());
    push_text_child(&mut item_elem, "upnp:class", item.upnp_class());

    if let Some(res) = item.res_element() {
        item_elem.children.push(XMLNode::Element(res));
    }

    let mut root = Element::new("DIDL-Lite");
    root.attributes
        .insert("xmlns".to_string(), NAMESPACE_DIDL.to_string());
    root.attributes
        .insert("xmlns:upnp".to_string(), NAMESPACE_UPNP.to_string());
    root.attributes
        .insert("xmlns:dc".to_string(), NAMESPACE_DC.to_string());
    root.children.push(XMLNode::Element(item_elem));

    write_fragment(&root)
}

fn push_text_child(parent: &mut Element, name: &str, value: Option<String>) {
    if let Some(value) = value {
        let mut child = Element::new(name);
        child.children.push(XMLNode::Text(recode_german(&value)));
        parent.children.push(XMLNode::Element(child));
    }
}

/// Replaces German umlauts and sharp s with their ASCII digraphs.
pub fn recode_german(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'ä' => out.push_str("ae"),
            'Ä' => out.push_str("Ae"),
            'ö' => out.push_str("oe"),
            'Ö' => out.push_str("Oe"),
            'ü' => out.push_str("ue"),
            'Ü' => out.push_str("Ue"),
            'ß' => out.push_str("ss"),
            _ => out.push(c),
        }
    }
    out
}

fn write_fragment(elem: &Element) -> Result<String, DidlError> {
    let mut buf = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(false);
    elem.write_with_config(&mut buf, config)?;
    Ok(String::from_utf8(buf).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_DIDL: &str = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"
        xmlns:dc="http://purl.org/dc/elements/1.1/"
        xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">
        <item id="64$1" parentID="64" restricted="1">
            <dc:title>Show must go on</dc:title>
            <dc:creator>Queen</dc:creator>
            <upnp:artist>Queen</upnp:artist>
            <upnp:actor>Queen</upnp:actor>
            <upnp:class>object.item.audioItem.musicTrack</upnp:class>
            <res protocolInfo="http-get:*:audio/mpeg:*" size="4223965" duration="0:04:23.000">http://192.168.1.5:8200/MediaItems/1.mp3</res>
        </item>
        <container id="64" parentID="0" restricted="1">
            <dc:title>Albums</dc:title>
            <upnp:class>object.container</upnp:class>
        </container>
    </DIDL-Lite>"#;

    #[test]
    fn test_parse_items_skips_containers() {
        let doc = DidlDocument::parse(SEARCH_DIDL).unwrap();
        assert_eq!(doc.items().len(), 1);
    }

    #[test]
    fn test_item_fields() {
        let doc = DidlDocument::parse(SEARCH_DIDL).unwrap();
        let item = &doc.items()[0];

        assert_eq!(item.title().as_deref(), Some("Show must go on"));
        assert_eq!(item.creator().as_deref(), Some("Queen"));
        assert_eq!(item.artist().as_deref(), Some("Queen"));
        assert_eq!(item.actor().as_deref(), Some("Queen"));
        assert_eq!(
            item.upnp_class().as_deref(),
            Some("object.item.audioItem.musicTrack")
        );
        assert_eq!(
            item.url().as_deref(),
            Some("http://192.168.1.5:8200/MediaItems/1.mp3")
        );
    }

    #[test]
    fn test_res_keeps_attributes_and_drops_prefix() {
        let xml = r#"<DIDL-Lite xmlns:d="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">
            <item id="1" parentID="0">
                <d:res protocolInfo="http-get:*:audio/flac:*" bitrate="176400">http://host/track.flac</d:res>
            </item>
        </DIDL-Lite>"#;

        // xmltree resolves the prefix away; what matters is the output.
        let doc = DidlDocument::parse(xml).unwrap();
        let res = doc.items()[0].res_as_string().unwrap();

        assert!(res.starts_with("<res"));
        assert!(res.contains(r#"protocolInfo="http-get:*:audio/flac:*""#));
        assert!(res.contains(r#"bitrate="176400""#));
        assert!(res.contains("http://host/track.flac"));
        assert!(!res.contains("xmlns"));
    }

    #[test]
    fn test_rejects_non_didl_root() {
        assert!(matches!(
            DidlDocument::parse("<html></html>"),
            Err(DidlError::NotDidl(_))
        ));
    }

    #[test]
    fn test_build_item_metadata() {
        let doc = DidlDocument::parse(SEARCH_DIDL).unwrap();
        let meta = build_item_metadata(&doc.items()[0]).unwrap();

        assert!(meta.starts_with("<DIDL-Lite"));
        assert!(meta.contains(r#"xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/""#));
        assert!(meta.contains("<dc:title>Show must go on</dc:title>"));
        assert!(meta.contains("<upnp:artist>Queen</upnp:artist>"));
        assert!(meta.contains("<upnp:class>object.item.audioItem.musicTrack</upnp:class>"));
        assert!(meta.contains(r#"protocolInfo="http-get:*:audio/mpeg:*""#));
        assert!(meta.contains(r#"restricted="1""#));
        // no XML declaration: the blob is embedded in a SOAP argument
        assert!(!meta.contains("<?xml"));
    }

    #[test]
    fn test_metadata_ids_are_fresh() {
        let doc = DidlDocument::parse(SEARCH_DIDL).unwrap();
        let first = build_item_metadata(&doc.items()[0]).unwrap();
        let second = build_item_metadata(&doc.items()[0]).unwrap();
        // uuids differ between calls
        assert_ne!(first, second);
    }

    #[test]
    fn test_metadata_transliterates_umlauts() {
        let xml = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"
            xmlns:dc="http://purl.org/dc/elements/1.1/"
            xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">
            <item id="1" parentID="0">
                <dc:title>Für Größe</dc:title>
                <upnp:artist>Die Ärzte</upnp:artist>
                <res protocolInfo="http-get:*:audio/mpeg:*">http://host/f%C3%BCr.mp3</res>
            </item>
        </DIDL-Lite>"#;

        let doc = DidlDocument::parse(xml).unwrap();
        let meta = build_item_metadata(&doc.items()[0]).unwrap();

        assert!(meta.contains("<dc:title>Fuer Groesse</dc:title>"));
        assert!(meta.contains("<upnp:artist>Die Aerzte</upnp:artist>"));
        // the resource URL stays untouched
        assert!(meta.contains("http://host/f%C3%BCr.mp3"));
    }

    #[test]
    fn test_recode_german() {
        assert_eq!(recode_german("äöüÄÖÜß"), "aeoeueAeOeUess");
        assert_eq!(recode_german("plain ascii"), "plain ascii");
    }
}
