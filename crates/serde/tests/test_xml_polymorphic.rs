use serde::{Deserialize, Serialize};
use weft_serde::{Result, SerdeError, from_xml_str, to_xml_string};
use weft_serde_support::{
    FieldDescriptor, FieldShape, PolymorphicDescriptor, QualifiedName, StructureDescriptor,
    VariantDescriptor, XmlDescribe,
};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
enum Shape {
    Circle { r: u32 },
    Square { side: u32 },
    Label(String),
    Empty,
}

fn shapes() -> PolymorphicDescriptor {
    PolymorphicDescriptor::new()
        .variant(
            VariantDescriptor::new("Circle")
                .discriminator("circle")
                .tag(QualifiedName::local("circle")),
        )
        .variant(
            VariantDescriptor::new("Square")
                .discriminator("square")
                .tag(QualifiedName::local("square")),
        )
        .variant(
            VariantDescriptor::new("Label")
                .discriminator("label")
                .tag(QualifiedName::local("label")),
        )
        .variant(VariantDescriptor::new("Empty").discriminator("none"))
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Drawing {
    name: String,
    shape: Shape,
}

impl XmlDescribe for Drawing {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Drawing")
            .tag(QualifiedName::local("drawing"))
            .field(FieldDescriptor::new("name").primitive())
            .field(FieldDescriptor::new("shape").polymorphic(shapes()))
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Gallery {
    item: Shape,
}

impl XmlDescribe for Gallery {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Gallery")
            .tag(QualifiedName::local("doc"))
            .field(FieldDescriptor::new("item").polymorphic(shapes().transparent()))
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Circle {
    r: u32,
}

/// The same document shape as a transparent `Gallery` holding a circle.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Plain {
    circle: Circle,
}

impl XmlDescribe for Plain {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Plain")
            .tag(QualifiedName::local("doc"))
            .field(FieldDescriptor::new("circle"))
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Canvas {
    shapes: Vec<Shape>,
}

impl XmlDescribe for Canvas {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Canvas")
            .tag(QualifiedName::local("canvas"))
            .field(
                FieldDescriptor::new("shapes")
                    .list(FieldShape::Polymorphic(shapes().transparent().into())),
            )
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
enum Color {
    Red,
    Green,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
enum Kind {
    Click { x: u32 },
}

/// Enums without a polymorphic descriptor.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Event {
    color: Color,
    kind: Kind,
}

impl XmlDescribe for Event {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Event")
            .tag(QualifiedName::local("event"))
            .field(FieldDescriptor::new("color"))
            .field(FieldDescriptor::new("kind"))
            .build()
    }
}

fn drawing(shape: Shape) -> Drawing {
    Drawing {
        name: "d".to_string(),
        shape,
    }
}

#[test]
fn test_discriminator_attribute() -> Result<()> {
    let value = drawing(Shape::Circle { r: 1 });
    let xml = to_xml_string(&value)?;
    assert_eq!(
        xml,
        r#"<drawing name="d"><shape type="circle"><circle r="1"/></shape></drawing>"#
    );
    assert_eq!(from_xml_str::<Drawing>(&xml)?, value);
    Ok(())
}

#[test]
fn test_newtype_and_unit_variants() -> Result<()> {
    let label = drawing(Shape::Label("hi".to_string()));
    let xml = to_xml_string(&label)?;
    assert_eq!(
        xml,
        r#"<drawing name="d"><shape type="label"><label>hi</label></shape></drawing>"#
    );
    assert_eq!(from_xml_str::<Drawing>(&xml)?, label);

    let empty = drawing(Shape::Empty);
    let xml = to_xml_string(&empty)?;
    assert_eq!(xml, r#"<drawing name="d"><shape>none</shape></drawing>"#);
    assert_eq!(from_xml_str::<Drawing>(&xml)?, empty);
    Ok(())
}

#[test]
fn test_unknown_discriminator_fails() {
    let xml = r#"<drawing name="d"><shape type="hexagon"><hexagon/></shape></drawing>"#;
    assert!(from_xml_str::<Drawing>(xml).is_err());
}

#[test]
fn test_transparent_matches_plain_field() -> Result<()> {
    let gallery = Gallery {
        item: Shape::Circle { r: 1 },
    };
    let plain = Plain {
        circle: Circle { r: 1 },
    };
    let xml = to_xml_string(&gallery)?;
    assert_eq!(xml, to_xml_string(&plain)?);
    assert_eq!(xml, r#"<doc><circle r="1"/></doc>"#);

    assert_eq!(from_xml_str::<Gallery>(&xml)?, gallery);
    assert_eq!(from_xml_str::<Plain>(&xml)?, plain);
    Ok(())
}

#[test]
fn test_transparent_unit_variant_keeps_field_name() -> Result<()> {
    let gallery = Gallery { item: Shape::Empty };
    let xml = to_xml_string(&gallery)?;
    assert_eq!(xml, "<doc><item>none</item></doc>");
    assert_eq!(from_xml_str::<Gallery>(&xml)?, gallery);
    Ok(())
}

#[test]
fn test_transparent_list_items_use_variant_tags() -> Result<()> {
    let canvas = Canvas {
        shapes: vec![Shape::Circle { r: 1 }, Shape::Square { side: 2 }, Shape::Circle { r: 3 }],
    };
    let xml = to_xml_string(&canvas)?;
    assert_eq!(
        xml,
        r#"<canvas><circle r="1"/><square side="2"/><circle r="3"/></canvas>"#
    );
    assert_eq!(from_xml_str::<Canvas>(&xml)?, canvas);
    Ok(())
}

#[test]
fn test_transparent_rejects_foreign_element() {
    let err = from_xml_str::<Gallery>(r#"<doc><triangle/></doc>"#).unwrap_err();
    assert!(matches!(err, SerdeError::UnknownName { .. }));
}

#[test]
fn test_enums_without_descriptor() -> Result<()> {
    let event = Event {
        color: Color::Green,
        kind: Kind::Click { x: 4 },
    };
    let xml = to_xml_string(&event)?;
    assert_eq!(
        xml,
        r#"<event color="Green"><kind type="Click"><Click x="4"/></kind></event>"#
    );
    assert_eq!(from_xml_str::<Event>(&xml)?, event);
    Ok(())
}
