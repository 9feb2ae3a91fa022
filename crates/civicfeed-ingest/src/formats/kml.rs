//! KML placemark parser.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::extract::description::{name_from_title, parse_description};
use crate::html::{decode_entities, strip_html};
use crate::types::SourceRow;

#[derive(Debug, Default)]
struct Placemark {
    title: String,
    description: String,
    coordinates: String,
    extended: Vec<(String, String)>,
}

impl Placemark {
    fn into_row(self) -> SourceRow {
        let mut row = SourceRow::new();

        for (key, value) in self.extended {
            let value = value.trim();
            if !key.is_empty() && !value.is_empty() {
                row.insert(key, value);
            }
        }

        let title = self.title.trim();
        if !title.is_empty() {
            row.insert("title", title);
            let name = name_from_title(title);
            if !name.is_empty() {
                row.insert("name", name);
            }
        }

        if !self.description.trim().is_empty() {
            row.insert("description", strip_html(&self.description));
            let parsed = parse_description(&self.description);
            if let Some(address) = parsed.clean_address {
                row.insert("address", address);
            }
            if let Some(id) = parsed.incident_id {
                row.insert("incident_id", id);
            }
            if let Some(ts) = parsed.timestamp {
                row.insert("updated_at", ts.to_rfc3339());
            }
        }

        if let Some((lon, lat)) = parse_coordinates(&self.coordinates) {
            row.insert("lat", lat);
            row.insert("lon", lon);
        }
        row
    }
}

/// KML coordinate tuples are `lon,lat[,alt]`; only the first tuple counts.
fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    let tuple = text.split_whitespace().next()?;
    let mut parts = tuple.split(',');
    let lon = parts.next()?.trim().parse::<f64>().ok()?;
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    (lon.is_finite() && lat.is_finite()).then_some((lon, lat))
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn name_attribute(e: &BytesStart<'_>) -> String {
    e.try_get_attribute("name")
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.trim().to_string()))
        .unwrap_or_default()
}

/// Parse KML into one row per `Placemark`.
///
/// A malformed document yields the placemarks completed before the error.
pub(crate) fn parse_kml(xml: &str) -> Vec<SourceRow> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut rows = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<Placemark> = None;
    let mut data_name = String::new();

    loop {
        let text = match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                match name.as_str() {
                    "Placemark" => current = Some(Placemark::default()),
                    "Data" | "SimpleData" => data_name = name_attribute(&e),
                    _ => {}
                }
                path.push(name);
                continue;
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "Placemark" {
                    if let Some(placemark) = current.take() {
                        rows.push(placemark.into_row());
                    }
                }
                path.pop();
                continue;
            }
            Ok(Event::Text(e)) => e
                .unescape()
                .map(std::borrow::Cow::into_owned)
                .unwrap_or_else(|_| decode_entities(&String::from_utf8_lossy(&e))),
            Ok(Event::CData(e)) => String::from_utf8_lossy(&e).into_owned(),
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    position = reader.buffer_position(),
                    placemarks = rows.len(),
                    "KML parse stopped early"
                );
                break;
            }
            Ok(_) => continue,
        };

        let Some(placemark) = current.as_mut() else {
            continue;
        };
        let tag = path.last().map_or("", String::as_str);
        let parent = path
            .len()
            .checked_sub(2)
            .and_then(|i| path.get(i))
            .map_or("", String::as_str);

        match (parent, tag) {
            ("Placemark", "name") => placemark.title.push_str(&text),
            ("Placemark", "description") => placemark.description.push_str(&text),
            (_, "coordinates") if placemark.coordinates.is_empty() => {
                placemark.coordinates = text;
            }
            ("Data", "value") | (_, "SimpleData") => {
                placemark.extended.push((data_name.clone(), text));
            }
            _ => {}
        }
    }

    rows
}
