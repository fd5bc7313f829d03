// Small helpers for persisting serde structs as JSON. State writes go
// through a temp file and a rename so a crash mid-write never leaves a
// half-written state file behind.

use anyhow::{bail, Context};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs::File, io::BufReader, io::Write, path::Path};

pub fn write<S, P>(serializable: &S, path: &P) -> anyhow::Result<()>
where
    S: ?Sized + Serialize,
    P: AsRef<Path>,
{
    let path_as_ref = path.as_ref();
    soundloom_debug!("Writing to {:?}", path_as_ref);

    let containing_dir = path_as_ref
        .parent()
        .with_context(|| format!("Failed to get parent dir for {:?}", path_as_ref))?;
    std::fs::create_dir_all(containing_dir)
        .with_context(|| format!("Failed to create dir {:?}", containing_dir))?;

    let mut temp = tempfile::NamedTempFile::new_in(containing_dir)
        .with_context(|| format!("Failed to create temp file near {:?}", path_as_ref))?;
    let json = serde_json::to_vec_pretty(serializable)
        .with_context(|| format!("failed to serialize to {:?}", path_as_ref))?;
    temp.write_all(&json)
        .with_context(|| format!("failed to write {:?}", path_as_ref))?;
    temp.persist(path_as_ref)
        .with_context(|| format!("failed to persist {:?}", path_as_ref))?;
    Ok(())
}

pub fn read<D, P>(path: &P) -> anyhow::Result<D>
where
    D: DeserializeOwned,
    P: AsRef<Path>,
{
    let path_as_ref = path.as_ref();
    soundloom_debug!("Reading from {:?}", path_as_ref);

    if !path_as_ref.exists() {
        bail!("File {} does not exist", path_as_ref.display());
    }

    let file = File::open(path_as_ref)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("failed to deserialize from {:?}", path_as_ref))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde::{Deserialize, Serialize};
    use tempdir::TempDir;

    use anyhow::Result;

    #[derive(Serialize, Deserialize, PartialEq, Eq)]
    struct TestStruct {
        a: u32,
        b: String,
    }

    #[test]
    fn writes_and_reads_serialized_object() -> Result<()> {
        let test_struct = TestStruct {
            a: 1,
            b: "hello".to_string(),
        };
        let temp_dir = TempDir::new("disk_io_test")?;
        let path = temp_dir.path().join("nested").join("test.json");
        super::write(&test_struct, &path)?;
        let read_struct: TestStruct = super::read(&path)?;

        assert!(test_struct == read_struct);

        Ok(())
    }

    #[test]
    fn read_errs_if_file_does_not_exist() {
        assert!(super::read::<TestStruct, _>(&Path::new("nonexistent.json")).is_err());
    }

    #[test]
    fn read_errs_if_struct_cannot_be_deserialized() -> Result<()> {
        let temp_dir = TempDir::new("disk_io_test")?;
        let path = &temp_dir.path().join("test.json");
        std::fs::write(path, "junk")?;

        assert!(super::read::<TestStruct, _>(&path).is_err());

        Ok(())
    }
}
