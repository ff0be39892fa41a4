//! Metalink 3.0 document assembly
//!
//! Turns the ranked mirror list and upstream release metadata into the XML
//! document consumed by package managers. No decisions are made here; the
//! order of resources is the order produced by the selector.

use crate::error::{MetalinkError, Result};
use crate::models::{Protocol, RepomdInfo};
use crate::selector::Advertised;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

pub const METALINK_NAMESPACE: &str = "http://www.metalinker.org/";
pub const MIRRORMANAGER_NAMESPACE: &str = "http://fedorahosted.org/mirrormanager";
pub const CONTENT_TYPE: &str = "application/metalink+xml; charset=utf-8";

/// Name of the single file described by every document
pub const FILE_NAME: &str = "repomd.xml";

/// One `<url>` element of the resources block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub protocol: Protocol,
    pub location: Option<String>,
    pub preference: i32,
    pub url: String,
}

impl From<&Advertised<'_>> for Resource {
    fn from(entry: &Advertised<'_>) -> Self {
        Resource {
            protocol: entry.protocol,
            location: entry.mirror.country.clone(),
            preference: entry.mirror.preference,
            url: entry.url(),
        }
    }
}

/// A dynamic metalink describing `repomd.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetalinkDocument {
    pub generator: String,
    pub max_connections: u32,
    pub info: RepomdInfo,
    pub resources: Vec<Resource>,
}

impl MetalinkDocument {
    pub fn new(
        generator: impl Into<String>,
        max_connections: u32,
        info: RepomdInfo,
        advertised: &[Advertised<'_>],
    ) -> Self {
        MetalinkDocument {
            generator: generator.into(),
            max_connections,
            info,
            resources: advertised.iter().map(Resource::from).collect(),
        }
    }

    /// Serialize to XML
    pub fn render(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
        )?;

        let mut root = BytesStart::new("metalink");
        root.push_attribute(("version", "3.0"));
        root.push_attribute(("xmlns", METALINK_NAMESPACE));
        root.push_attribute(("xmlns:mm0", MIRRORMANAGER_NAMESPACE));
        root.push_attribute(("type", "dynamic"));
        root.push_attribute(("generator", self.generator.as_str()));
        emit(&mut writer, Event::Start(root))?;
        emit(&mut writer, Event::Start(BytesStart::new("files")))?;

        let mut file = BytesStart::new("file");
        file.push_attribute(("name", FILE_NAME));
        emit(&mut writer, Event::Start(file))?;

        text_element(&mut writer, "mm0:timestamp", &self.info.timestamp.to_string())?;
        text_element(&mut writer, "size", &self.info.size.to_string())?;

        emit(&mut writer, Event::Start(BytesStart::new("verification")))?;
        for (algorithm, digest) in &self.info.hashes {
            let mut hash = BytesStart::new("hash");
            hash.push_attribute(("type", algorithm.as_str()));
            emit(&mut writer, Event::Start(hash))?;
            emit(&mut writer, Event::Text(BytesText::new(digest)))?;
            emit(&mut writer, Event::End(BytesEnd::new("hash")))?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("verification")))?;

        let max_connections = self.max_connections.to_string();
        let mut resources = BytesStart::new("resources");
        resources.push_attribute(("maxconnections", max_connections.as_str()));
        emit(&mut writer, Event::Start(resources))?;
        for resource in &self.resources {
            let preference = resource.preference.to_string();
            let mut url = BytesStart::new("url");
            url.push_attribute(("type", resource.protocol.as_str()));
            url.push_attribute(("protocol", resource.protocol.as_str()));
            if let Some(location) = resource.location.as_deref() {
                url.push_attribute(("location", location));
            }
            url.push_attribute(("preference", preference.as_str()));
            emit(&mut writer, Event::Start(url))?;
            emit(&mut writer, Event::Text(BytesText::new(&resource.url)))?;
            emit(&mut writer, Event::End(BytesEnd::new("url")))?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("resources")))?;

        emit(&mut writer, Event::End(BytesEnd::new("file")))?;
        emit(&mut writer, Event::End(BytesEnd::new("files")))?;
        emit(&mut writer, Event::End(BytesEnd::new("metalink")))?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| MetalinkError::RenderError(format!("Document is not UTF-8: {}", e)))
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| MetalinkError::RenderError(e.to_string()))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}
