//! Writer Parquet (géométries en WKB, compression zstd)

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use geozero::{CoordDimensions, ToWkb};
use parquet::basic::{Compression, ConvertedType, Repetition, Type as PhysicalType, ZstdLevel};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::{Type, TypePtr};
use tracing::debug;

use super::{ColumnKind, ErrorLayer};
use topofilter::Value;

/// Écrit une couche d'erreurs dans un fichier Parquet
pub fn write_layer(path: &Path, layer: &ErrorLayer) -> Result<()> {
    let schema = build_schema(layer)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();

    let file = File::create(path)
        .with_context(|| format!("Cannot create parquet file: {}", path.display()))?;
    let mut writer = SerializedFileWriter::new(file, schema, Arc::new(props))?;
    let mut row_group = writer.next_row_group()?;

    let mut col_idx = 0usize;
    while let Some(mut column) = row_group.next_column()? {
        if col_idx == 0 {
            write_geometries(layer, column.untyped())?;
        } else {
            write_attribute(layer, col_idx - 1, column.untyped())?;
        }
        column.close()?;
        col_idx += 1;
    }

    row_group.close()?;
    writer.close()?;

    debug!(path = %path.display(), rows = layer.rows.len(), "Parquet write");
    Ok(())
}

fn build_schema(layer: &ErrorLayer) -> Result<TypePtr> {
    let mut fields: Vec<TypePtr> = vec![Arc::new(
        Type::primitive_type_builder("geom", PhysicalType::BYTE_ARRAY)
            .with_repetition(Repetition::REQUIRED)
            .build()?,
    )];

    for column in &layer.columns {
        let field = match column.kind {
            ColumnKind::Text => Type::primitive_type_builder(&column.name, PhysicalType::BYTE_ARRAY)
                .with_repetition(Repetition::OPTIONAL)
                .with_converted_type(ConvertedType::UTF8)
                .build()?,
            ColumnKind::Bool => Type::primitive_type_builder(&column.name, PhysicalType::BOOLEAN)
                .with_repetition(Repetition::OPTIONAL)
                .build()?,
            ColumnKind::Float => Type::primitive_type_builder(&column.name, PhysicalType::DOUBLE)
                .with_repetition(Repetition::OPTIONAL)
                .build()?,
        };
        fields.push(Arc::new(field));
    }

    Ok(Arc::new(
        Type::group_type_builder("schema").with_fields(fields).build()?,
    ))
}

fn write_geometries(layer: &ErrorLayer, writer: &mut ColumnWriter<'_>) -> Result<()> {
    let mut values = Vec::with_capacity(layer.rows.len());
    for row in &layer.rows {
        let wkb = row
            .geometry
            .to_wkb(CoordDimensions::xy())
            .map_err(|e| anyhow::anyhow!("WKB encode failed: {}", e))?;
        values.push(ByteArray::from(wkb));
    }

    match writer {
        ColumnWriter::ByteArrayColumnWriter(w) => {
            w.write_batch(&values, None, None)?;
        }
        _ => anyhow::bail!("Unexpected writer type for geometry column"),
    }
    Ok(())
}

fn write_attribute(layer: &ErrorLayer, idx: usize, writer: &mut ColumnWriter<'_>) -> Result<()> {
    let kind = layer.columns[idx].kind;
    let cells = layer.rows.iter().map(|row| &row.values[idx]);

    match kind {
        ColumnKind::Text => {
            let mut values = Vec::new();
            let mut def_levels = Vec::with_capacity(layer.rows.len());
            for cell in cells {
                if cell.is_null() {
                    def_levels.push(0);
                } else {
                    values.push(ByteArray::from(cell.as_text().into_bytes()));
                    def_levels.push(1);
                }
            }
            match writer {
                ColumnWriter::ByteArrayColumnWriter(w) => {
                    w.write_batch(&values, Some(&def_levels), None)?;
                }
                _ => anyhow::bail!("Unexpected writer type for text column"),
            }
        }
        ColumnKind::Bool => {
            let mut values = Vec::new();
            let mut def_levels = Vec::with_capacity(layer.rows.len());
            for cell in cells {
                match cell {
                    Value::Bool(b) => {
                        values.push(*b);
                        def_levels.push(1);
                    }
                    _ => def_levels.push(0),
                }
            }
            match writer {
                ColumnWriter::BoolColumnWriter(w) => {
                    w.write_batch(&values, Some(&def_levels), None)?;
                }
                _ => anyhow::bail!("Unexpected writer type for boolean column"),
            }
        }
        ColumnKind::Float => {
            let mut values = Vec::new();
            let mut def_levels = Vec::with_capacity(layer.rows.len());
            for cell in cells {
                match cell {
                    Value::Float(f) => {
                        values.push(*f);
                        def_levels.push(1);
                    }
                    Value::Int(n) => {
                        values.push(*n as f64);
                        def_levels.push(1);
                    }
                    _ => def_levels.push(0),
                }
            }
            match writer {
                ColumnWriter::DoubleColumnWriter(w) => {
                    w.write_batch(&values, Some(&def_levels), None)?;
                }
                _ => anyhow::bail!("Unexpected writer type for float column"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Column, ErrorRow};
    use crate::store::FeatureStore;
    use geo::{Geometry, Point};

    #[tokio::test]
    async fn test_written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lakes_topology_self_intersect.parquet");

        let layer = ErrorLayer {
            name: "lakes_topology_self_intersect".to_string(),
            srid: 2193,
            columns: vec![
                Column {
                    name: "pair_keys".to_string(),
                    kind: ColumnKind::Text,
                },
                Column {
                    name: "area".to_string(),
                    kind: ColumnKind::Float,
                },
                Column {
                    name: "open".to_string(),
                    kind: ColumnKind::Bool,
                },
            ],
            rows: vec![
                ErrorRow {
                    geometry: Geometry::Point(Point::new(1.0, 2.0)),
                    values: vec![
                        Value::Text("a-b".to_string()),
                        Value::Float(4.5),
                        Value::Bool(true),
                    ],
                },
                ErrorRow {
                    geometry: Geometry::Point(Point::new(3.0, 4.0)),
                    values: vec![Value::Text("a-c".to_string()), Value::Null, Value::Bool(true)],
                },
            ],
        };
        write_layer(&path, &layer).unwrap();

        let store = FeatureStore::open(dir.path().to_str().unwrap()).await.unwrap();
        let collection = store
            .read("lakes_topology_self_intersect", None, None)
            .await
            .unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(
            collection.features[0].attribute_text("pair_keys").as_deref(),
            Some("a-b")
        );
        assert_eq!(
            collection.features[0].attribute("area"),
            Some(&Value::Float(4.5))
        );
        assert_eq!(collection.features[1].attribute("area"), Some(&Value::Null));
    }
}
