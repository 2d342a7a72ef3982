use anyhow::{Context, Result};
use geo::Point;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use gtfs_replay_transit::trajectory::ShapePoint;
use gtfs_replay_transit::PrecomputedTrajectory;
use gtfs_replay_transit::{format_gtfs_time, VehiclePosition};
use std::path::Path;

/// Which simulated instant a vehicle feature belongs to
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub index: usize,
    pub time: f64,
}

fn point_to_geojson(point: Point) -> Value {
    Value::Point(vec![point.x(), point.y()])
}

fn feature(geometry: Value, properties: serde_json::Map<String, serde_json::Value>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Create a GeoJSON Feature for one vehicle in one frame
pub fn vehicle_feature(vehicle: &VehiclePosition, frame: Frame) -> Feature {
    let mut properties = serde_json::Map::new();
    properties.insert("feature_type".to_string(), serde_json::json!("vehicle"));
    properties.insert("tripId".to_string(), serde_json::json!(vehicle.trip_id.as_str()));
    properties.insert("routeId".to_string(), serde_json::json!(vehicle.route_id.as_str()));
    properties.insert("color".to_string(), serde_json::json!(&*vehicle.color));
    properties.insert("bearing".to_string(), serde_json::json!(vehicle.bearing));
    properties.insert(
        "headsign".to_string(),
        serde_json::json!(vehicle.headsign.as_deref()),
    );
    properties.insert("nextStopId".to_string(), serde_json::json!(vehicle.next_stop_id.as_str()));
    properties.insert("progress".to_string(), serde_json::json!(vehicle.progress));
    properties.insert("frame".to_string(), serde_json::json!(frame.index));
    properties.insert("time".to_string(), serde_json::json!(format_gtfs_time(frame.time)));

    feature(point_to_geojson(vehicle.position), properties)
}

/// Create a LineString Feature from a processed shape
pub fn shape_feature(shape_id: &str, points: &[ShapePoint]) -> Feature {
    let coords: Vec<Vec<f64>> = points.iter().map(|p| vec![p.lon(), p.lat()]).collect();

    let mut properties = serde_json::Map::new();
    properties.insert("feature_type".to_string(), serde_json::json!("shape"));
    properties.insert("shapeId".to_string(), serde_json::json!(shape_id));
    let length_m = points.last().map(|p| p.distance_from_start).unwrap_or(0.0);
    properties.insert("length_m".to_string(), serde_json::json!(length_m));

    feature(Value::LineString(coords), properties)
}

/// Create a LineString Feature for the whole path of one trip
pub fn trajectory_feature(trajectory: &PrecomputedTrajectory) -> Feature {
    let coords: Vec<Vec<f64>> = trajectory
        .line_string()
        .0
        .iter()
        .map(|c| vec![c.x, c.y])
        .collect();

    let mut properties = serde_json::Map::new();
    properties.insert("feature_type".to_string(), serde_json::json!("trip_path"));
    properties.insert("tripId".to_string(), serde_json::json!(trajectory.trip_id.as_str()));
    properties.insert(
        "shapeId".to_string(),
        serde_json::json!(trajectory.shape_id.as_ref().map(|id| id.as_str())),
    );
    properties.insert("departure".to_string(), serde_json::json!(format_gtfs_time(trajectory.first_departure as f64)));
    properties.insert("arrival".to_string(), serde_json::json!(format_gtfs_time(trajectory.last_arrival() as f64)));

    feature(Value::LineString(coords), properties)
}

/// Create a Point Feature for a stop
pub fn stop_feature(stop_id: &str, name: Option<&str>, location: Point) -> Feature {
    let mut properties = serde_json::Map::new();
    properties.insert("feature_type".to_string(), serde_json::json!("stop"));
    properties.insert("stopId".to_string(), serde_json::json!(stop_id));
    properties.insert("name".to_string(), serde_json::json!(name));

    feature(point_to_geojson(location), properties)
}

/// Write features to a GeoJSON file as one FeatureCollection
pub fn write_features_geojson(features: Vec<Feature>, output_path: &Path) -> Result<()> {
    tracing::info!("Writing {} features to {}", features.len(), output_path.display());

    let feature_collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let geojson = GeoJson::from(feature_collection);
    let json_string = serde_json::to_string_pretty(&geojson).context("Failed to serialize GeoJSON")?;

    std::fs::write(output_path, json_string)
        .with_context(|| format!("Failed to write GeoJSON to {}", output_path.display()))?;

    Ok(())
}
