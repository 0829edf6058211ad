use std::{borrow::Cow, io};

use quick_xml::{
    escape::escape,
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};

use super::feature::{AnalysisFeature, DEFAULT_BOUNDARY_HALF_WIDTH};

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// KML colors are `AABBGGRR`.
pub const HIGH_CHANGE_COLOR: &str = "ff0000ff";
pub const MEDIUM_CHANGE_COLOR: &str = "ff00a5ff";
pub const LOW_CHANGE_COLOR: &str = "ff00ff00";

/// Alpha of the boundary fill, applied over the placemark color.
const FILL_ALPHA: &str = "4d";

const ICON_HREF: &str = "http://maps.google.com/mapfiles/kml/shapes/placemark_circle.png";

/// Placemark color for a change magnitude: red above 50 %, orange above 25 %, green otherwise.
pub fn change_color(change_percent: Option<f64>) -> &'static str {
    let magnitude = change_percent.map(f64::abs).unwrap_or(0.0);
    if magnitude > 50.0 {
        HIGH_CHANGE_COLOR
    } else if magnitude > 25.0 {
        MEDIUM_CHANGE_COLOR
    } else {
        LOW_CHANGE_COLOR
    }
}

/// Escape the XML special characters `& < > " '` of free text.
pub fn escape_text(text: &str) -> Cow<str> {
    escape(text)
}

/// Human readable label of an event type, e.g. `environmental_change` → `Environmental Change`.
pub fn event_label(event_type: &str) -> String {
    event_type
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render features as a KML 2.2 document named `document_name`, one placemark per feature.
pub fn to_kml_string(features: &[AnalysisFeature], document_name: &str) -> io::Result<String> {
    to_kml_string_with_half_width(features, document_name, DEFAULT_BOUNDARY_HALF_WIDTH)
}

pub fn to_kml_string_with_half_width(
    features: &[AnalysisFeature],
    document_name: &str,
    boundary_half_width: f64,
) -> io::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)])),
    )?;
    write(&mut writer, Event::Start(BytesStart::new("Document")))?;
    write_text_element(&mut writer, "name", document_name)?;
    write_text_element(
        &mut writer,
        "description",
        &format!("{} environmental change analyses", features.len()),
    )?;
    for feature in features {
        write_placemark(&mut writer, feature, boundary_half_width)?;
    }
    write(&mut writer, Event::End(BytesEnd::new("Document")))?;
    write(&mut writer, Event::End(BytesEnd::new("kml")))?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn xml_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

fn write<W: io::Write>(writer: &mut Writer<W>, event: Event) -> io::Result<()> {
    writer.write_event(event).map_err(xml_error)
}

fn write_text_element<W: io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> io::Result<()> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::from_escaped(escape_text(text))))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn format_change(change_percent: Option<f64>) -> String {
    match change_percent {
        Some(change) => format!("{:.1}%", change),
        None => "n/a".to_string(),
    }
}

/// HTML balloon content. Every interpolated value is escaped, so it can never close the
/// surrounding CDATA section.
fn description_html(feature: &AnalysisFeature) -> String {
    let mut html = format!(
        "<h3>{}</h3><p><b>Event:</b> {}</p><p><b>Change:</b> {}</p><p><b>Period:</b> {} to {}</p>",
        escape_text(&feature.name),
        escape_text(&event_label(&feature.event_type)),
        format_change(feature.change_percent),
        feature.start_date,
        feature.end_date
    );
    if let Some(area) = &feature.area_analyzed {
        html.push_str(&format!("<p><b>Area:</b> {}</p>", escape_text(area)));
    }
    if let Some(summary) = &feature.summary {
        html.push_str(&format!("<p>{}</p>", escape_text(summary)));
    }
    html
}

fn write_style<W: io::Write>(writer: &mut Writer<W>, color: &str) -> io::Result<()> {
    let fill_color = format!("{}{}", FILL_ALPHA, &color[2..]);
    write(writer, Event::Start(BytesStart::new("Style")))?;

    write(writer, Event::Start(BytesStart::new("IconStyle")))?;
    write_text_element(writer, "color", color)?;
    write_text_element(writer, "scale", "1.1")?;
    write(writer, Event::Start(BytesStart::new("Icon")))?;
    write_text_element(writer, "href", ICON_HREF)?;
    write(writer, Event::End(BytesEnd::new("Icon")))?;
    write(writer, Event::End(BytesEnd::new("IconStyle")))?;

    write(writer, Event::Start(BytesStart::new("LineStyle")))?;
    write_text_element(writer, "color", color)?;
    write_text_element(writer, "width", "2")?;
    write(writer, Event::End(BytesEnd::new("LineStyle")))?;

    write(writer, Event::Start(BytesStart::new("PolyStyle")))?;
    write_text_element(writer, "color", &fill_color)?;
    write(writer, Event::End(BytesEnd::new("PolyStyle")))?;

    write(writer, Event::End(BytesEnd::new("Style")))
}

fn write_extended_data<W: io::Write>(
    writer: &mut Writer<W>,
    feature: &AnalysisFeature,
) -> io::Result<()> {
    let change = feature
        .change_percent
        .map(|change| change.to_string())
        .unwrap_or_default();
    let entries = [
        ("id", feature.id.clone()),
        ("event_type", feature.event_type.clone()),
        ("change_percent", change),
        ("start_date", feature.start_date.to_string()),
        ("end_date", feature.end_date.to_string()),
        ("area_analyzed", feature.area_analyzed.clone().unwrap_or_default()),
        ("summary", feature.summary.clone().unwrap_or_default()),
        ("latitude", feature.coordinates.lat().to_string()),
        ("longitude", feature.coordinates.lng().to_string()),
    ];
    write(writer, Event::Start(BytesStart::new("ExtendedData")))?;
    for (name, value) in entries {
        write(
            writer,
            Event::Start(BytesStart::new("Data").with_attributes([("name", name)])),
        )?;
        write_text_element(writer, "value", &value)?;
        write(writer, Event::End(BytesEnd::new("Data")))?;
    }
    write(writer, Event::End(BytesEnd::new("ExtendedData")))
}

fn write_geometry<W: io::Write>(
    writer: &mut Writer<W>,
    feature: &AnalysisFeature,
    boundary_half_width: f64,
) -> io::Result<()> {
    let coordinates = &feature.coordinates;
    let ring = coordinates
        .boundary_ring(boundary_half_width)
        .iter()
        .map(|[lng, lat]| format!("{},{},0", lng, lat))
        .collect::<Vec<_>>()
        .join(" ");

    write(writer, Event::Start(BytesStart::new("MultiGeometry")))?;

    write(writer, Event::Start(BytesStart::new("Point")))?;
    write_text_element(
        writer,
        "coordinates",
        &format!("{},{},0", coordinates.lng(), coordinates.lat()),
    )?;
    write(writer, Event::End(BytesEnd::new("Point")))?;

    write(writer, Event::Start(BytesStart::new("Polygon")))?;
    write(writer, Event::Start(BytesStart::new("outerBoundaryIs")))?;
    write(writer, Event::Start(BytesStart::new("LinearRing")))?;
    write_text_element(writer, "coordinates", &ring)?;
    write(writer, Event::End(BytesEnd::new("LinearRing")))?;
    write(writer, Event::End(BytesEnd::new("outerBoundaryIs")))?;
    write(writer, Event::End(BytesEnd::new("Polygon")))?;

    write(writer, Event::End(BytesEnd::new("MultiGeometry")))
}

fn write_placemark<W: io::Write>(
    writer: &mut Writer<W>,
    feature: &AnalysisFeature,
    boundary_half_width: f64,
) -> io::Result<()> {
    write(
        writer,
        Event::Start(BytesStart::new("Placemark").with_attributes([("id", feature.id.as_str())])),
    )?;
    write_text_element(writer, "name", &feature.name)?;
    write(writer, Event::Start(BytesStart::new("description")))?;
    write(writer, Event::CData(BytesCData::new(description_html(feature))))?;
    write(writer, Event::End(BytesEnd::new("description")))?;
    write_style(writer, change_color(feature.change_percent))?;
    write_extended_data(writer, feature)?;
    write_geometry(writer, feature, boundary_half_width)?;
    write(writer, Event::End(BytesEnd::new("Placemark")))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use quick_xml::{events::Event, Reader};
    use rstest::rstest;

    use super::{change_color, event_label, to_kml_string};
    use crate::geofile::feature::{AnalysisFeature, Coordinates};

    fn feature(name: &str, change_percent: Option<f64>) -> AnalysisFeature {
        AnalysisFeature {
            id: "f-1".to_string(),
            name: name.to_string(),
            coordinates: Coordinates::new(45.5, -73.25).unwrap(),
            event_type: "urbanization".to_string(),
            change_percent,
            start_date: NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            summary: Some("Growth \"north\" of the river's bend".to_string()),
            area_analyzed: Some("35 km²".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
        }
    }

    #[rstest]
    #[case(Some(75.0), "ff0000ff")]
    #[case(Some(-75.0), "ff0000ff")]
    #[case(Some(30.0), "ff00a5ff")]
    #[case(Some(50.0), "ff00a5ff")]
    #[case(Some(10.0), "ff00ff00")]
    #[case(Some(25.0), "ff00ff00")]
    #[case(None, "ff00ff00")]
    fn test_change_color(#[case] change_percent: Option<f64>, #[case] expected: &str) {
        assert_eq!(expected, change_color(change_percent));
    }

    #[test]
    fn test_text_nodes_are_escaped() {
        let kml = to_kml_string(&[feature("A & B <C>", Some(75.0))], "Q&A <export>").unwrap();
        assert!(kml.contains("<name>A &amp; B &lt;C&gt;</name>"));
        assert!(kml.contains("<name>Q&amp;A &lt;export&gt;</name>"));
        assert!(kml.contains("Growth &quot;north&quot; of the river&apos;s bend"));
        assert!(!kml.contains("A & B"));
    }

    #[test]
    fn test_placemark_structure() {
        let kml = to_kml_string(&[feature("Montreal", Some(-30.0))], "export").unwrap();
        assert_eq!(1, kml.matches("<Placemark").count());
        assert_eq!(1, kml.matches("<MultiGeometry>").count());
        assert!(kml.contains("<coordinates>-73.25,45.5,0</coordinates>"));
        assert_eq!(2, kml.matches("<color>ff00a5ff</color>").count());
        assert!(kml.contains("<color>4d00a5ff</color>"));
        assert!(kml.contains("<![CDATA[<h3>Montreal</h3>"));
        assert!(kml.contains("<b>Event:</b> Urbanization"));
        assert!(kml.contains("<b>Change:</b> -30.0%"));
        assert!(kml.contains("<Data name=\"change_percent\">"));
        assert!(kml.contains("<value>-30</value>"));
        assert!(kml.contains("<value>35 km²</value>"));

        let ring_start = kml.find("<LinearRing>").unwrap();
        let coordinates_start = ring_start + kml[ring_start..].find("<coordinates>").unwrap();
        let coordinates_end =
            coordinates_start + kml[coordinates_start..].find("</coordinates>").unwrap();
        let ring = &kml[coordinates_start + "<coordinates>".len()..coordinates_end];
        let positions: Vec<&str> = ring.split(' ').collect();
        assert_eq!(5, positions.len());
        assert_eq!(positions[0], positions[4]);
    }

    #[test]
    fn test_empty_input_is_valid_document() {
        let kml = to_kml_string(&[], "empty").unwrap();
        assert!(kml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(kml.contains("<kml xmlns=\"http://www.opengis.net/kml/2.2\">"));
        assert!(kml.contains("<Document>"));
        assert!(kml.contains("</Document>"));
        assert!(!kml.contains("<Placemark"));
        assert!(kml.trim_end().ends_with("</kml>"));
    }

    /// Parse the document, checking that every element is closed by a matching end tag.
    /// Returns the unescaped `name` texts and placemark ids.
    fn parse_kml(kml: &str) -> (Vec<String>, Vec<String>) {
        let mut reader = Reader::from_str(kml);
        let mut open = Vec::new();
        let (mut names, mut ids) = (Vec::new(), Vec::new());
        loop {
            match reader.read_event().unwrap() {
                Event::Start(start) => {
                    if start.name().as_ref() == b"Placemark" {
                        let id = start.try_get_attribute("id").unwrap().unwrap();
                        ids.push(id.unescape_value().unwrap().into_owned());
                    }
                    open.push(start.name().as_ref().to_vec());
                }
                Event::End(end) => {
                    assert_eq!(Some(end.name().as_ref().to_vec()), open.pop());
                }
                Event::Text(text) if open.last().map(Vec::as_slice) == Some(&b"name"[..]) => {
                    names.push(text.unescape().unwrap().into_owned());
                }
                Event::Eof => break,
                _ => {}
            }
        }
        assert!(open.is_empty());
        (names, ids)
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![("a\"<]]>'&", "x ]]> <![CDATA[ y")])]
    #[case(vec![("b-1", "Río \"Doce\" & Co's ]]>"), ("b-2", "plain")])]
    fn test_output_is_well_formed_xml(#[case] placemarks: Vec<(&str, &str)>) {
        let features: Vec<AnalysisFeature> = placemarks
            .iter()
            .map(|(id, name)| {
                let mut feature = feature(name, Some(60.0));
                feature.id = id.to_string();
                feature.summary = Some(format!("{} summary ]]> & more", name));
                feature
            })
            .collect();
        let kml = to_kml_string(&features, "doc ]]> & \"export\"").unwrap();

        let (names, ids) = parse_kml(&kml);
        let mut expected_names = vec!["doc ]]> & \"export\"".to_string()];
        expected_names.extend(placemarks.iter().map(|(_, name)| name.to_string()));
        assert_eq!(expected_names, names);
        let expected_ids: Vec<String> = placemarks.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(expected_ids, ids);
    }

    #[rstest]
    #[case("environmental_change", "Environmental Change")]
    #[case("wildfire", "Wildfire")]
    #[case("land use", "Land Use")]
    #[case("", "")]
    fn test_event_label(#[case] event_type: &str, #[case] expected: &str) {
        assert_eq!(expected, event_label(event_type));
    }
}
