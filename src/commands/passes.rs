use std::path::Path;
use westra_passes::catalog::{CatalogClient, CatalogConfig};
use westra_passes::gpxxml::{read_track_bounds, save_waypoints};
use westra_passes::kml::{TranslateOptions, parse_catalog, translate};
use westra_passes::{Result, expand_bounds};

/// Downloads the passes around the track at `input` and saves them to `output`.
pub fn passes_command(
    input: &Path,
    output: &Path,
    offset_km: f64,
    catalog: CatalogConfig,
    opts: &TranslateOptions,
) -> Result<()> {
    let client = CatalogClient::new(catalog)?;

    let bounds = read_track_bounds(input)?;
    log::info!("track {} spans {bounds}", input.display());

    let search = expand_bounds(&bounds, offset_km)?;
    log::info!("searching {search} ({offset_km} km around the track)");

    let body = client.fetch(&search)?;
    let document = parse_catalog(&body)
        .map_err(|e| e.located(format!("from {}", client.catalog_url(&search))))?;

    let waypoints = translate(Some(&document), opts);
    log::info!(
        "{} passes in {} folders",
        waypoints.len(),
        document.folders.len()
    );

    save_waypoints(output, &waypoints)?;
    log::info!("wrote {}", output.display());
    Ok(())
}
