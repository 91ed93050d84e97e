use rowspec_schema::inheritance::{check_compatibility, check_parent, merge_fields, qualified_identifier};
use rowspec_schema::{DeclarationLoader, Error, NameRegistry, Owner};
use rowspec_types::{SchemaVersion, TypeExpr};
use std::path::PathBuf;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

#[test]
fn test_document_declares_parent_then_child() -> anyhow::Result<()> {
    let loader = DeclarationLoader::new(vec![data_dir()]);
    let document = loader.load("shapes")?;

    let mut registry = NameRegistry::new();
    for schema in &document.schemas {
        registry.register(schema.schema_version()?.name(), &document.owner)?;
    }

    let declarations = document.declarations()?;
    let base = declarations[0].parse()?;
    let square = declarations[1].parse()?;
    assert_eq!(base.schema_version.to_string(), "shapes.base@1");
    assert_eq!(square.parent, Some(SchemaVersion::new("shapes.base", 1)?));

    let base_fields = merge_fields(None, &base.fields);
    let base_id = qualified_identifier(&base.schema_version, None);

    let parent = square.parent.clone().unwrap();
    check_parent(&square.schema_version, &parent)?;
    check_compatibility(&square.schema_version, &parent, &base_fields, &square.fields)?;

    let square_fields = merge_fields(Some(&base_fields), &square.fields);
    assert_eq!(square_fields.names(), vec!["id", "label", "area", "side"]);
    assert_eq!(square_fields.get("area").unwrap().declared_type, TypeExpr::Float64);
    assert_eq!(
        qualified_identifier(&square.schema_version, Some(&base_id)),
        "shapes.square@1>shapes.base@1"
    );
    assert_eq!(square.constraint_names(), vec!["side > 0"]);
    assert_eq!(square.record_name, "ShapesSquareV1");
    Ok(())
}

#[test]
fn test_second_owner_cannot_take_a_name() -> anyhow::Result<()> {
    let loader = DeclarationLoader::default();
    let document = loader.load_from_file(&data_dir().join("shapes.yaml"))?;

    let mut registry = NameRegistry::new();
    let name = document.schemas[0].schema_version()?.name().clone();
    registry.register(&name, &document.owner)?;

    let err = registry
        .register(&name, &Owner::new("Intruder"))
        .unwrap_err();
    assert!(matches!(err, Error::NamingCollision { .. }));
    assert!(err.to_string().contains("Shapes 0.3.1"));
    Ok(())
}
