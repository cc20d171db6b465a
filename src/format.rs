// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::io;

/// Format of an input XML file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Uncompressed XML
    #[default]
    Xml,

    /// XML with [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    XmlGz,

    /// XML with [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    XmlBz2,
}

impl FileFormat {
    /// Guesses the format from a file name, defaulting to [FileFormat::Xml].
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(".gz") {
            Self::XmlGz
        } else if name.ends_with(".bz2") {
            Self::XmlBz2
        } else {
            Self::Xml
        }
    }
}

/// Wraps a stream in a decompressor (if necessary) and a buffered reader.
pub(crate) fn buffered<'a, R: io::Read + 'a>(reader: R, format: FileFormat) -> Box<dyn io::BufRead + 'a> {
    match format {
        FileFormat::Xml => Box::new(io::BufReader::new(reader)),
        FileFormat::XmlGz => {
            let d = flate2::read::MultiGzDecoder::new(reader);
            Box::new(io::BufReader::new(d))
        }
        FileFormat::XmlBz2 => {
            let d = bzip2::read::MultiBzDecoder::new(reader);
            Box::new(io::BufReader::new(d))
        }
    }
}

/// Parser is a trait for objects which can parse XML.
///
/// This trait only exists to fix the mismatch of
/// [quick_xml::Reader::read_event] when working on buffered data
/// and [quick_xml::Reader::read_event_into] when working on IO.
pub(crate) trait Parser {
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<quick_xml::events::Event<'a>>;
}

/// IoParser implements [Parser] over an [std::io::BufRead].
pub(crate) struct IoParser<R: io::BufRead>(quick_xml::Reader<R>, Vec<u8>);

impl<R: io::BufRead> IoParser<R> {
    #[inline]
    pub(crate) fn new(reader: R) -> Self {
        Self(quick_xml::Reader::from_reader(reader), Vec::default())
    }
}

impl<R: io::BufRead> Parser for IoParser<R> {
    #[inline]
    fn read_event<'a>(&'a mut self) -> quick_xml::Result<quick_xml::events::Event<'a>> {
        self.1.clear();
        self.0.read_event_into(&mut self.1)
    }
}

/// BufParser implements [Parser] over a slice of bytes (`&[u8]`).
pub(crate) struct BufParser<'a>(quick_xml::Reader<&'a [u8]>);

impl<'a> BufParser<'a> {
    #[inline]
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self(quick_xml::Reader::from_reader(data))
    }
}

impl<'a> Parser for BufParser<'a> {
    #[inline]
    fn read_event<'b>(&'b mut self) -> quick_xml::Result<quick_xml::events::Event<'b>> {
        self.0.read_event()
    }
}

/// Collects attributes of an XML element, in document order.
/// Attributes which are malformed or not valid UTF-8 are skipped.
pub(crate) fn attributes_of(start: &quick_xml::events::BytesStart<'_>) -> Vec<(String, String)> {
    start
        .attributes()
        .filter_map(|attr| {
            let attr = attr.ok()?;
            let key = std::str::from_utf8(attr.key.as_ref()).ok()?;
            let value = std::str::from_utf8(&attr.value).ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Returns the value of an attribute collected by [attributes_of], or an empty string.
pub(crate) fn attribute<'a>(attrs: &'a [(String, String)], key: &str) -> &'a str {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}
