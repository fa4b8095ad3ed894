use pretty_assertions::assert_eq;
use tracing_test::traced_test;

use brres::dump::dump_to_string;
use brres::error::{Error, Result};
use brres::write::BrresWriter;
use brres_sub::schema::SchemaSet;

#[traced_test]
#[test]
fn dump_shows_directories_files_and_references() -> Result<()> {
    let mut writer = BrresWriter::default();
    writer.add_file("models/course", vec![1, 2, 3, 4])?;
    writer.add_file("top.bin", vec![5, 6, 7, 8])?;

    let output = writer.build()?;
    let text = dump_to_string(&output.bytes, &SchemaSet::builtin())?;

    assert!(text.starts_with("brres: size=0x"));
    assert!(text.contains("dir \"models\""));
    assert!(text.contains("file \"course\""));
    assert!(text.contains("file \"top.bin\""));
    assert!(text.contains("opaque block"));

    Ok(())
}

#[traced_test]
#[test]
fn dump_rejects_a_non_container() {
    let result = dump_to_string(b"not a container at all", &SchemaSet::builtin());
    assert!(matches!(result, Err(Error::InvalidContainer)));
}

#[traced_test]
#[test]
fn dump_of_empty_container() -> Result<()> {
    let output = BrresWriter::default().build()?;
    let text = dump_to_string(&output.bytes, &SchemaSet::builtin())?;

    assert_eq!(
        text,
        "brres: size=0x80 sections=1 root=0x10\n\
         root: size=0x20\n\
         group @0x0018 (0 children)\n"
    );

    Ok(())
}
