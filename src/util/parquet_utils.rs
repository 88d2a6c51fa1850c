use anyhow::{Context, bail};
use arrow2::{
    array::{Array, PrimitiveArray},
    io::parquet::read,
};
use std::fs::File;
use std::path::Path;

/// View a numeric arrow column as `f64` values. Null entries and
/// non-numeric column types are rejected.
fn column_as_f64(array: &dyn Array, name: &str) -> anyhow::Result<Vec<f64>> {
    if array.null_count() > 0 {
        bail!(
            "column {:?} contains {} null value(s); every sample must be present",
            name,
            array.null_count()
        );
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<PrimitiveArray<f64>>() {
        return Ok(a.values().to_vec());
    }
    if let Some(a) = any.downcast_ref::<PrimitiveArray<f32>>() {
        return Ok(a.values().iter().map(|&v| v as f64).collect());
    }
    if let Some(a) = any.downcast_ref::<PrimitiveArray<i64>>() {
        return Ok(a.values().iter().map(|&v| v as f64).collect());
    }
    if let Some(a) = any.downcast_ref::<PrimitiveArray<i32>>() {
        return Ok(a.values().iter().map(|&v| v as f64).collect());
    }
    if let Some(a) = any.downcast_ref::<PrimitiveArray<u64>>() {
        return Ok(a.values().iter().map(|&v| v as f64).collect());
    }
    if let Some(a) = any.downcast_ref::<PrimitiveArray<u32>>() {
        return Ok(a.values().iter().map(|&v| v as f64).collect());
    }
    bail!(
        "column {:?} has type {:?}, which is not a supported numeric type",
        name,
        array.data_type()
    )
}

/// Read every column of the parquet file at `path` as `f64` values,
/// concatenating across row groups. Returns the column names along with
/// the columns, in schema order.
pub(crate) fn read_numeric_columns(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Vec<f64>>)> {
    let mut file =
        File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    let metadata = read::read_metadata(&mut file)
        .with_context(|| format!("could not read parquet metadata from {}", path.display()))?;
    let schema = read::infer_schema(&metadata)?;

    let names: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    let chunks = read::FileReader::new(file, metadata.row_groups, schema, None, None, None);
    for maybe_chunk in chunks {
        let chunk = maybe_chunk?;
        for ((col, name), array) in columns.iter_mut().zip(names.iter()).zip(chunk.columns()) {
            col.extend(column_as_f64(array.as_ref(), name)?);
        }
    }
    Ok((names, columns))
}

#[cfg(test)]
pub(crate) mod test_utils {
    use arrow2::{
        array::Array,
        chunk::Chunk,
        datatypes::Schema,
        io::parquet::write::{
            CompressionOptions, Encoding, FileWriter, RowGroupIterator, Version, WriteOptions,
            transverse,
        },
    };
    use std::fs::File;
    use std::path::Path;

    /// Write `chunk` as a single plain-encoded row group.
    pub(crate) fn write_parquet(
        path: &Path,
        schema: Schema,
        chunk: Chunk<Box<dyn Array>>,
    ) -> anyhow::Result<()> {
        let options = WriteOptions {
            write_statistics: false,
            compression: CompressionOptions::Uncompressed,
            version: Version::V2,
            data_pagesize_limit: None,
        };
        let encodings: Vec<Vec<Encoding>> = schema
            .fields
            .iter()
            .map(|f| transverse(&f.data_type, |_| Encoding::Plain))
            .collect();
        let groups =
            RowGroupIterator::try_new(std::iter::once(Ok(chunk)), &schema, options, encodings)?;

        let mut writer = FileWriter::try_new(File::create(path)?, schema.clone(), options)?;
        for group in groups {
            writer.write(group?)?;
        }
        writer.end(None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::write_parquet;
    use super::*;
    use arrow2::{
        array::{Float32Array, Float64Array, UInt32Array, Utf8Array},
        chunk::Chunk,
        datatypes::{Field, Schema},
    };

    #[test]
    fn numeric_columns_are_widened_to_f64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.parquet");

        let chain = UInt32Array::from_vec(vec![0, 1, 0, 1]);
        let x = Float32Array::from_vec(vec![0.5, 1.5, 2.5, 3.5]);
        let y = Float64Array::from_vec(vec![-1.0, -2.0, -3.0, -4.0]);
        let schema = Schema::from(vec![
            Field::new("chain", chain.data_type().clone(), false),
            Field::new("x", x.data_type().clone(), false),
            Field::new("y", y.data_type().clone(), false),
        ]);
        let chunk = Chunk::new(vec![chain.boxed(), x.boxed(), y.boxed()]);
        write_parquet(&path, schema, chunk).unwrap();

        let (names, columns) = read_numeric_columns(&path).unwrap();
        assert_eq!(names, vec!["chain", "x", "y"]);
        assert_eq!(columns[0], vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(columns[1], vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(columns[2], vec![-1.0, -2.0, -3.0, -4.0]);
    }

    #[test]
    fn string_columns_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.parquet");

        let name = Utf8Array::<i32>::from_slice(["a", "b"]);
        let schema = Schema::from(vec![Field::new("name", name.data_type().clone(), false)]);
        let chunk = Chunk::new(vec![name.boxed()]);
        write_parquet(&path, schema, chunk).unwrap();

        let err = read_numeric_columns(&path).unwrap_err();
        assert!(format!("{err}").contains("not a supported numeric type"));
    }
}
