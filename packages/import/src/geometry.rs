//! Geometry serialization into dialect-specific SQL value expressions.

use carto_import_models::Dialect;
use geo::{Coord, Geometry, LineString, Polygon};
use wkt::ToWkt as _;

/// Read-only view of a feature geometry.
pub trait GeometryValue {
    /// Whether the geometry has no coordinates.
    fn is_empty(&self) -> bool;

    /// Little-endian well-known binary.
    fn to_wkb(&self) -> Vec<u8>;

    /// Well-known text.
    fn to_wkt(&self) -> String;
}

impl GeometryValue for Geometry<f64> {
    fn is_empty(&self) -> bool {
        geo::HasDimensions::is_empty(self)
    }

    fn to_wkb(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_geometry(&mut out, self);
        out
    }

    fn to_wkt(&self) -> String {
        self.wkt_string()
    }
}

/// Encodes a non-empty geometry as a SQL value expression for `dialect`.
///
/// Databricks receives a quoted WKT literal. Every other dialect receives
/// hex-encoded WKB passed to its WKB constructor; `PostgreSQL` needs the
/// hex literal decoded to `bytea` first.
#[must_use]
pub fn encode<G: GeometryValue + ?Sized>(geometry: &G, dialect: Dialect) -> String {
    match dialect {
        Dialect::Databricks => format!("'{}'", geometry.to_wkt()),
        Dialect::BigQuery => format!("ST_GEOGFROMWKB('{}')", hex::encode(geometry.to_wkb())),
        Dialect::Snowflake => format!("TO_GEOGRAPHY('{}')", hex::encode(geometry.to_wkb())),
        Dialect::Redshift => format!("ST_GEOMFROMWKB('{}')", hex::encode(geometry.to_wkb())),
        Dialect::Postgres => format!(
            "ST_GEOMFROMWKB(DECODE('{}', 'hex'))",
            hex::encode(geometry.to_wkb())
        ),
    }
}

// ── WKB writer ──────────────────────────────────────────────────────

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOINT: u32 = 4;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;
const WKB_GEOMETRYCOLLECTION: u32 = 7;

fn write_geometry(out: &mut Vec<u8>, geometry: &Geometry<f64>) {
    match geometry {
        Geometry::Point(point) => {
            write_header(out, WKB_POINT);
            write_coord(out, point.0);
        }
        Geometry::Line(line) => {
            write_header(out, WKB_LINESTRING);
            write_len(out, 2);
            write_coord(out, line.start);
            write_coord(out, line.end);
        }
        Geometry::LineString(line_string) => {
            write_header(out, WKB_LINESTRING);
            write_ring(out, line_string);
        }
        Geometry::Polygon(polygon) => write_polygon(out, polygon),
        Geometry::MultiPoint(multi) => {
            write_header(out, WKB_MULTIPOINT);
            write_len(out, multi.0.len());
            for point in &multi.0 {
                write_header(out, WKB_POINT);
                write_coord(out, point.0);
            }
        }
        Geometry::MultiLineString(multi) => {
            write_header(out, WKB_MULTILINESTRING);
            write_len(out, multi.0.len());
            for line_string in &multi.0 {
                write_header(out, WKB_LINESTRING);
                write_ring(out, line_string);
            }
        }
        Geometry::MultiPolygon(multi) => {
            write_header(out, WKB_MULTIPOLYGON);
            write_len(out, multi.0.len());
            for polygon in &multi.0 {
                write_polygon(out, polygon);
            }
        }
        Geometry::GeometryCollection(collection) => {
            write_header(out, WKB_GEOMETRYCOLLECTION);
            write_len(out, collection.0.len());
            for member in &collection.0 {
                write_geometry(out, member);
            }
        }
        Geometry::Rect(rect) => write_polygon(out, &rect.to_polygon()),
        Geometry::Triangle(triangle) => write_polygon(out, &triangle.to_polygon()),
    }
}

fn write_polygon(out: &mut Vec<u8>, polygon: &Polygon<f64>) {
    write_header(out, WKB_POLYGON);
    if polygon.exterior().0.is_empty() {
        write_len(out, 0);
        return;
    }
    write_len(out, 1 + polygon.interiors().len());
    write_ring(out, polygon.exterior());
    for interior in polygon.interiors() {
        write_ring(out, interior);
    }
}

fn write_ring(out: &mut Vec<u8>, line_string: &LineString<f64>) {
    write_len(out, line_string.0.len());
    for coord in &line_string.0 {
        write_coord(out, *coord);
    }
}

fn write_header(out: &mut Vec<u8>, geometry_type: u32) {
    // 1 = little endian
    out.push(1);
    out.extend_from_slice(&geometry_type.to_le_bytes());
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
}

fn write_coord(out: &mut Vec<u8>, coord: Coord<f64>) {
    out.extend_from_slice(&coord.x.to_le_bytes());
    out.extend_from_slice(&coord.y.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiPoint, Point, polygon};

    const POINT_1_2_HEX: &str = "0101000000000000000000f03f0000000000000040";

    fn point() -> Geometry<f64> {
        Geometry::Point(Point::new(1.0, 2.0))
    }

    #[test]
    fn point_wkb_is_little_endian() {
        assert_eq!(hex::encode(point().to_wkb()), POINT_1_2_HEX);
    }

    #[test]
    fn polygon_wkb_layout() {
        let square: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
        .into();
        let wkb = square.to_wkb();
        // header(5) + ring count(4) + point count(4) + 4 coords * 16
        assert_eq!(wkb.len(), 5 + 4 + 4 + 4 * 16);
        assert_eq!(&wkb[1..5], &3u32.to_le_bytes());
        assert_eq!(&wkb[5..9], &1u32.to_le_bytes());
        assert_eq!(&wkb[9..13], &4u32.to_le_bytes());
    }

    #[test]
    fn multipoint_members_carry_headers() {
        let multi: Geometry<f64> =
            MultiPoint::from(vec![Point::new(1.0, 2.0), Point::new(1.0, 2.0)]).into();
        let encoded = hex::encode(multi.to_wkb());
        assert!(encoded.starts_with("010400000002000000"));
        assert!(encoded.ends_with(POINT_1_2_HEX));
    }

    #[test]
    fn empty_line_string_is_empty() {
        let empty: Geometry<f64> = LineString::<f64>::new(vec![]).into();
        assert!(GeometryValue::is_empty(&empty));
        assert!(!GeometryValue::is_empty(&point()));
    }

    #[test]
    fn encodes_per_dialect() {
        let geometry = point();
        assert_eq!(
            encode(&geometry, Dialect::BigQuery),
            format!("ST_GEOGFROMWKB('{POINT_1_2_HEX}')")
        );
        assert_eq!(
            encode(&geometry, Dialect::Redshift),
            format!("ST_GEOMFROMWKB('{POINT_1_2_HEX}')")
        );
        assert_eq!(
            encode(&geometry, Dialect::Postgres),
            format!("ST_GEOMFROMWKB(DECODE('{POINT_1_2_HEX}', 'hex'))")
        );
        assert_eq!(
            encode(&geometry, Dialect::Snowflake),
            format!("TO_GEOGRAPHY('{POINT_1_2_HEX}')")
        );
    }

    #[test]
    fn databricks_receives_quoted_wkt() {
        let encoded = encode(&point(), Dialect::Databricks);
        assert!(encoded.starts_with("'POINT"), "{encoded}");
        assert!(encoded.ends_with("1 2)'"), "{encoded}");
    }
}
