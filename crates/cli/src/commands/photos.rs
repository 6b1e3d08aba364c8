use anyhow::{anyhow, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde_json::Value;
use spherekeep_core::config::StoreConfig;
use spherekeep_core::display::{format_capture_time, NOT_AVAILABLE};
use spherekeep_core::domain::{Photo, Place};
use spherekeep_core::geo;
use spherekeep_core::record::{ApiLatLng, PhotoRecord};

use super::open_store;

pub(crate) fn format_coordinates(photo: &Photo) -> String {
    match (photo.latitude, photo.longitude) {
        (Some(lat), Some(lng)) => format!("{lat:.5}, {lng:.5}"),
        _ => "\u{2014}".to_string(),
    }
}

pub(crate) fn place_names(places: &[Place]) -> String {
    let names: Vec<&str> = places.iter().filter_map(|p| p.name.as_deref()).collect();
    if names.is_empty() {
        "Unknown Location".to_string()
    } else {
        names.join(", ")
    }
}

fn status_cell(photo: &Photo) -> Cell {
    let status = photo.maps_publish_status.as_deref().unwrap_or(NOT_AVAILABLE);
    if photo.is_published() {
        Cell::new(status).fg(Color::Green)
    } else {
        Cell::new(status).fg(Color::Yellow)
    }
}

fn photo_table(header_extra: Option<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let mut header = vec![
        Cell::new("Photo"),
        Cell::new("Captured"),
        Cell::new("Location"),
        Cell::new("Places"),
        Cell::new("Views"),
        Cell::new("Status"),
        Cell::new("Links"),
    ];
    if let Some(extra) = header_extra {
        header.push(Cell::new(extra));
    }
    table.set_header(header);
    table
}

fn photo_row(photo: &Photo) -> Vec<Cell> {
    vec![
        Cell::new(&photo.photo_id),
        Cell::new(format_capture_time(photo.capture_time.as_deref())),
        Cell::new(format_coordinates(photo)),
        Cell::new(place_names(&photo.places)),
        Cell::new(photo.view_count.unwrap_or(0)),
        status_cell(photo),
        Cell::new(photo.connections.len()),
    ]
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn show(config: &StoreConfig, id: &str, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let photo = store
        .catalog()
        .get(id)?
        .ok_or_else(|| anyhow!("photo not found: {id}"))?;

    if json {
        return print_json(&photo.to_api());
    }

    let or_na = |v: Option<f64>| v.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string());

    println!("Photo {}", photo.photo_id);
    println!("{}", "-".repeat(60));
    println!("  Captured:    {}", format_capture_time(photo.capture_time.as_deref()));
    println!("  Uploaded:    {}", format_capture_time(photo.upload_time.as_deref()));
    println!("  Location:    {}", format_coordinates(&photo));
    println!("  Heading:     {}", or_na(photo.heading));
    println!("  Altitude:    {}", or_na(photo.altitude));
    println!("  Pitch/Roll:  {} / {}", or_na(photo.pitch), or_na(photo.roll));
    println!("  Views:       {}", photo.view_count.unwrap_or(0));
    println!(
        "  Status:      {}",
        photo.maps_publish_status.as_deref().unwrap_or(NOT_AVAILABLE)
    );
    if let Some(link) = &photo.share_link {
        println!("  Share link:  {link}");
    }
    println!("  Cached at:   {}", photo.updated_at);

    if !photo.places.is_empty() {
        println!();
        println!("  Places");
        for place in &photo.places {
            println!(
                "    {} ({})",
                place.name.as_deref().unwrap_or(&place.place_id),
                place.language_code.as_deref().unwrap_or("?"),
            );
        }
    }
    if !photo.connections.is_empty() {
        println!();
        println!("  Connected to");
        for target in &photo.connections {
            println!("    {target}");
        }
    }
    Ok(())
}

/// Apply a pose correction the way the edit form does: rebuild the upstream
/// payload, overwrite the edited fields, and upsert it.
pub fn edit(
    config: &StoreConfig,
    id: &str,
    coordinates: Option<(String, String)>,
    heading: Option<&str>,
) -> Result<()> {
    let store = open_store(config)?;
    let photo = store
        .catalog()
        .get(id)?
        .ok_or_else(|| anyhow!("photo not found: {id}"))?;

    let mut payload = photo.to_api();
    let pose = payload.pose.get_or_insert_with(Default::default);
    if let Some((lat, lng)) = coordinates {
        let (lat, lng) = geo::parse_coordinates(&lat, &lng)?;
        pose.lat_lng_pair = Some(ApiLatLng {
            latitude: Some(Value::from(lat)),
            longitude: Some(Value::from(lng)),
        });
    }
    if let Some(heading) = heading {
        pose.heading = geo::parse_heading(Some(heading))?.map(Value::from);
    }

    let record = PhotoRecord::from_api(payload)?;
    store.catalog().upsert(&record)?;
    println!("Updated {id}");
    Ok(())
}

pub fn ls(config: &StoreConfig) -> Result<()> {
    let store = open_store(config)?;
    let photos = store.catalog().list_all()?;

    if photos.is_empty() {
        println!("No photos cached. Run `spherekeep import <file>` first.");
        return Ok(());
    }

    let mut table = photo_table(None);
    for photo in &photos {
        table.add_row(photo_row(photo));
    }

    let published = photos.iter().filter(|p| p.is_published()).count();
    println!();
    println!("{table}");
    println!();
    println!("  {} photos ({} published)", photos.len(), published);
    println!();
    Ok(())
}

pub fn nearby(
    config: &StoreConfig,
    lat: &str,
    lng: &str,
    radius_m: f64,
    exclude: Option<&str>,
    json: bool,
) -> Result<()> {
    let (lat, lng) = geo::parse_coordinates(lat, lng)?;
    let store = open_store(config)?;
    let hits = store.nearby(lat, lng, radius_m, exclude)?;

    if json {
        let payloads: Vec<_> = hits.iter().map(|hit| hit.photo.to_api()).collect();
        return print_json(&payloads);
    }

    if hits.is_empty() {
        println!("No photos within {radius_m} m of {lat}, {lng}.");
        return Ok(());
    }

    let mut table = photo_table(Some("Distance"));
    for hit in &hits {
        let mut row = photo_row(&hit.photo);
        row.push(Cell::new(format!("{:.1} m", hit.distance_m)));
        table.add_row(row);
    }
    println!("{table}");
    Ok(())
}

pub fn connections(config: &StoreConfig, ids: &[String]) -> Result<()> {
    let store = open_store(config)?;
    let edges = store.catalog().connections_for_sources(ids)?;

    if edges.is_empty() {
        println!("No connections.");
        return Ok(());
    }
    for edge in &edges {
        println!("{} -> {}", edge.source, edge.target);
    }
    Ok(())
}

fn print_neighbor(neighbor: Option<String>) {
    match neighbor {
        Some(id) => println!("{id}"),
        None => println!("(none)"),
    }
}

pub fn next(config: &StoreConfig, id: &str) -> Result<()> {
    let store = open_store(config)?;
    print_neighbor(store.catalog().next(id)?);
    Ok(())
}

pub fn prev(config: &StoreConfig, id: &str) -> Result<()> {
    let store = open_store(config)?;
    print_neighbor(store.catalog().previous(id)?);
    Ok(())
}

pub fn map(config: &StoreConfig) -> Result<()> {
    let store = open_store(config)?;
    print_json(&store.catalog().map_points()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_photo(id: &str) -> Photo {
        Photo {
            photo_id: id.to_string(),
            latitude: None,
            longitude: None,
            heading: None,
            altitude: None,
            pitch: None,
            roll: None,
            capture_time: None,
            upload_time: None,
            view_count: None,
            maps_publish_status: None,
            share_link: None,
            thumbnail_url: None,
            updated_at: "2024-01-15T12:00:00.000000".to_string(),
            places: Vec::new(),
            connections: Vec::new(),
        }
    }

    fn place(id: &str, name: Option<&str>) -> Place {
        Place {
            place_id: id.to_string(),
            name: name.map(str::to_string),
            language_code: None,
        }
    }

    // ── format_coordinates ──────────────────────────────────────────

    #[test]
    fn test_format_coordinates() {
        let mut photo = make_photo("p1");
        photo.latitude = Some(51.5074);
        photo.longitude = Some(-0.1278);
        assert_eq!(format_coordinates(&photo), "51.50740, -0.12780");
    }

    #[test]
    fn test_format_coordinates_missing() {
        let mut photo = make_photo("p1");
        photo.latitude = Some(51.5074);
        assert_eq!(format_coordinates(&photo), "\u{2014}");
    }

    // ── place_names ─────────────────────────────────────────────────

    #[test]
    fn test_place_names_joined() {
        let places = vec![place("a", Some("London")), place("b", None), place("c", Some("UK"))];
        assert_eq!(place_names(&places), "London, UK");
    }

    #[test]
    fn test_place_names_unknown() {
        assert_eq!(place_names(&[]), "Unknown Location");
        assert_eq!(place_names(&[place("a", None)]), "Unknown Location");
    }

    #[test]
    fn test_photo_row_width_matches_header() {
        let table = photo_table(None);
        assert_eq!(photo_row(&make_photo("p1")).len(), table.header().map_or(0, |h| h.cell_count()));
    }
}
