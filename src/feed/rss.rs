//! RSS 2.0 output

use crate::feed::{FeedDesc, Record};
use chrono::Local;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RssError {
    #[error("failed to write RSS: {0}")]
    Write(String),

    #[error("RSS output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

type XmlWriter = Writer<Vec<u8>>;

/// Renders a feed's records as an RSS 2.0 document
///
/// Channel `pubDate` is the newest record's timestamp, or the current time for
/// an empty feed. Record bodies are emitted inside CDATA, every other text
/// node is escaped.
pub fn render_rss(desc: &FeedDesc, records: &[Record]) -> Result<String, RssError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    write(&mut writer, Event::Start(rss))?;
    write(&mut writer, Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &desc.title)?;
    write_text_element(&mut writer, "link", &desc.link)?;
    write_text_element(&mut writer, "description", &desc.description)?;
    if !desc.language.is_empty() {
        write_text_element(&mut writer, "language", &desc.language)?;
    }
    if !desc.generator.is_empty() {
        write_text_element(&mut writer, "generator", &desc.generator)?;
    }

    let published = records
        .iter()
        .map(|r| r.published_at)
        .max()
        .unwrap_or_else(|| Local::now().fixed_offset());
    write_text_element(&mut writer, "pubDate", &published.to_rfc2822())?;

    if !desc.image.is_empty() {
        write(&mut writer, Event::Start(BytesStart::new("image")))?;
        write_text_element(&mut writer, "url", &desc.image)?;
        write_text_element(&mut writer, "title", &desc.title)?;
        write_text_element(&mut writer, "link", &desc.link)?;
        write(&mut writer, Event::End(BytesEnd::new("image")))?;
    }

    for record in records {
        write_item(&mut writer, record)?;
    }

    write(&mut writer, Event::End(BytesEnd::new("channel")))?;
    write(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    Ok(xml)
}

fn write_item(writer: &mut XmlWriter, record: &Record) -> Result<(), RssError> {
    write(writer, Event::Start(BytesStart::new("item")))?;
    write_text_element(writer, "title", &record.title)?;
    write_text_element(writer, "link", &record.link)?;
    write_text_element(writer, "guid", &record.guid)?;
    write_text_element(writer, "pubDate", &record.published_at.to_rfc2822())?;
    if let Some(category) = &record.category {
        write_text_element(writer, "category", category)?;
    }
    if let Some(thumb) = &record.thumbnail {
        write_text_element(writer, "thumb", thumb)?;
    }
    write(writer, Event::Start(BytesStart::new("description")))?;
    write(writer, Event::CData(BytesCData::new(record.body.as_str())))?;
    write(writer, Event::End(BytesEnd::new("description")))?;
    write(writer, Event::End(BytesEnd::new("item")))
}

fn write_text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), RssError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), RssError> {
    writer
        .write_event(event)
        .map_err(|e| RssError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn desc() -> FeedDesc {
        FeedDesc {
            title: "Demo & Co".to_string(),
            link: "https://example.com/".to_string(),
            description: "A demo feed".to_string(),
            ..Default::default()
        }
    }

    fn record(key: &str, at: &str) -> Record {
        Record {
            key: key.to_string(),
            title: format!("Item <{key}>"),
            link: format!("https://example.com/{key}"),
            guid: key.to_string(),
            category: Some("news".to_string()),
            published_at: DateTime::parse_from_rfc3339(at).unwrap(),
            body: "<p>body</p>".to_string(),
            thumbnail: None,
            feed: "Demo & Co".to_string(),
        }
    }

    #[test]
    fn test_render_escapes_channel_and_items() {
        let xml = render_rss(&desc(), &[record("a", "2021-11-01T04:20:00+08:00")]).unwrap();

        assert!(xml.contains("<title>Demo &amp; Co</title>"));
        assert!(xml.contains("<title>Item &lt;a&gt;</title>"));
        assert!(xml.contains("<![CDATA[<p>body</p>]]>"));
        assert!(xml.contains("<category>news</category>"));
        assert!(!xml.contains("<thumb>"));
    }

    #[test]
    fn test_thumbnail_is_written() {
        let mut item = record("a", "2021-11-01T04:20:00+08:00");
        item.thumbnail = Some("https://example.com/a.png?w=1&h=2".to_string());
        let xml = render_rss(&desc(), &[item]).unwrap();

        assert!(xml.contains("<thumb>https://example.com/a.png?w=1&amp;h=2</thumb>"));
    }

    #[test]
    fn test_channel_pub_date_is_newest_record() {
        let records = [
            record("a", "2021-11-01T04:20:00+00:00"),
            record("b", "2021-11-03T04:20:00+00:00"),
        ];
        let xml = render_rss(&desc(), &records).unwrap();
        let newest = format!("<pubDate>{}</pubDate>", records[1].published_at.to_rfc2822());

        let channel_date = xml.find(&newest).unwrap();
        assert!(channel_date < xml.find("<item>").unwrap());
    }

    #[test]
    fn test_empty_feed() {
        let xml = render_rss(&desc(), &[]).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(!xml.contains("<item>"));
        assert!(xml.trim_end().ends_with("</rss>"));
    }
}
