//! `GDAL_METADATA` XML block carrying per-band descriptions
//!
//! ```text
//! <GDALMetadata>
//!   <Item name="DESCRIPTION" sample="0" role="description">B04-Apr</Item>
//! </GDALMetadata>
//! ```

use crate::error::Result;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Render band labels as a `GDAL_METADATA` document
pub(crate) fn band_descriptions_xml(labels: &[String]) -> String {
    let mut xml = String::from("<GDALMetadata>");
    for (sample, label) in labels.iter().enumerate() {
        xml.push_str(&format!(
            "<Item name=\"DESCRIPTION\" sample=\"{}\" role=\"description\">{}</Item>",
            sample,
            escape(label.as_str())
        ));
    }
    xml.push_str("</GDALMetadata>");
    xml
}

/// Extract band descriptions, indexed by sample, from a `GDAL_METADATA` document.
///
/// Bands without a description are `None`. Items for samples beyond `bands`
/// are ignored.
pub(crate) fn parse_band_descriptions(xml: &str, bands: usize) -> Result<Vec<Option<String>>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut descriptions = vec![None; bands];
    let mut buf = Vec::new();
    let mut current: Option<usize> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Item" => {
                let mut is_description = false;
                let mut sample = None;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value()?;
                    match attr.key.as_ref() {
                        b"name" => is_description = value == "DESCRIPTION",
                        b"sample" => sample = value.trim().parse::<usize>().ok(),
                        _ => {}
                    }
                }
                current = if is_description { sample } else { None };
            }
            Event::Text(t) => {
                if let Some(sample) = current {
                    if let Some(slot) = descriptions.get_mut(sample) {
                        *slot = Some(t.unescape()?.into_owned());
                    }
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(descriptions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions_round_trip() {
        let labels = vec!["B04-Apr".to_string(), "NDVI & <Aug>".to_string()];
        let xml = band_descriptions_xml(&labels);
        let parsed = parse_band_descriptions(&xml, 3).unwrap();
        assert_eq!(
            parsed,
            vec![Some("B04-Apr".into()), Some("NDVI & <Aug>".into()), None]
        );
    }

    #[test]
    fn test_ignores_other_items() {
        let xml = r#"<GDALMetadata>
            <Item name="OFFSET" sample="0" role="offset">0</Item>
            <Item name="DESCRIPTION" sample="1" role="description">NIR</Item>
            <Item name="AREA_OR_POINT">Area</Item>
        </GDALMetadata>"#;
        let parsed = parse_band_descriptions(xml, 2).unwrap();
        assert_eq!(parsed, vec![None, Some("NIR".into())]);
    }
}
