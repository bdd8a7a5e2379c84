use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weft_serde::{Result, SerdeError, XmlCodec, from_xml_str, to_xml_string};
use weft_serde_support::{
    FieldDescriptor, FieldShape, QualifiedName, StructureDescriptor, XmlDescribe,
};

/// Repeated elements directly inside the owner.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Bag {
    name: String,
    tag: Vec<String>,
}

impl XmlDescribe for Bag {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Bag")
            .tag(QualifiedName::local("bag"))
            .field(FieldDescriptor::new("name").primitive())
            .field(FieldDescriptor::new("tag").list(FieldShape::Primitive))
            .build()
    }
}

/// Items inside a wrapper element, declared before an attribute.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Basket {
    tags: Vec<String>,
    owner: String,
}

impl XmlDescribe for Basket {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Basket")
            .tag(QualifiedName::local("basket"))
            .field(
                FieldDescriptor::new("tags")
                    .list(FieldShape::Primitive)
                    .child_name(QualifiedName::local("tag")),
            )
            .field(FieldDescriptor::new("owner").primitive())
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Book {
    title: String,
}

impl XmlDescribe for Book {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Book")
            .tag(QualifiedName::local("book"))
            .field(FieldDescriptor::new("title").primitive())
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Library {
    book: Vec<Book>,
    note: String,
}

impl XmlDescribe for Library {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Library")
            .tag(QualifiedName::local("library"))
            .field(FieldDescriptor::new("book").list(FieldShape::structure::<Book>()))
            .field(FieldDescriptor::new("note").primitive().element())
            .build()
    }
}

/// A collection at the root, through a newtype.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Tags(Vec<String>);

impl XmlDescribe for Tags {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Tags")
            .tag(QualifiedName::local("tags"))
            .field(
                FieldDescriptor::new("0")
                    .list(FieldShape::Primitive)
                    .child_name(QualifiedName::local("tag")),
            )
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Counts {
    count: BTreeMap<String, u32>,
}

impl XmlDescribe for Counts {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Counts")
            .tag(QualifiedName::local("counts"))
            .field(FieldDescriptor::new("count").map(FieldShape::Primitive))
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Scores {
    score: BTreeMap<u32, Option<String>>,
}

impl XmlDescribe for Scores {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Scores")
            .tag(QualifiedName::local("scores"))
            .field(FieldDescriptor::new("score").map(FieldShape::Primitive))
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Person {
    age: u32,
}

impl XmlDescribe for Person {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Person")
            .tag(QualifiedName::local("person"))
            .field(FieldDescriptor::new("age").primitive())
            .build()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Registry {
    people: BTreeMap<String, Person>,
}

impl XmlDescribe for Registry {
    fn describe() -> StructureDescriptor {
        StructureDescriptor::builder("Registry")
            .tag(QualifiedName::local("registry"))
            .field(
                FieldDescriptor::new("people")
                    .map(FieldShape::structure::<Person>())
                    .child_name(QualifiedName::local("entry")),
            )
            .build()
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_anonymous_list() -> Result<()> {
    let bag = Bag {
        name: "b".to_string(),
        tag: strings(&["a", "b", "c"]),
    };
    let xml = to_xml_string(&bag)?;
    assert_eq!(
        xml,
        r#"<bag name="b"><tag>a</tag><tag>b</tag><tag>c</tag></bag>"#
    );
    assert_eq!(from_xml_str::<Bag>(&xml)?, bag);
    Ok(())
}

#[test]
fn test_empty_anonymous_list_writes_nothing() -> Result<()> {
    let bag = Bag {
        name: "b".to_string(),
        tag: Vec::new(),
    };
    let xml = to_xml_string(&bag)?;
    assert_eq!(xml, r#"<bag name="b"/>"#);
    assert_eq!(from_xml_str::<Bag>(&xml)?, bag);
    Ok(())
}

#[test]
fn test_wrapped_list() -> Result<()> {
    let basket = Basket {
        tags: strings(&["a", "b", "c"]),
        owner: "o".to_string(),
    };
    let xml = to_xml_string(&basket)?;
    assert_eq!(
        xml,
        r#"<basket owner="o"><tags><tag>a</tag><tag>b</tag><tag>c</tag></tags></basket>"#
    );
    assert_eq!(from_xml_str::<Basket>(&xml)?, basket);

    let empty = Basket {
        tags: Vec::new(),
        owner: "o".to_string(),
    };
    let xml = to_xml_string(&empty)?;
    assert_eq!(xml, r#"<basket owner="o"><tags/></basket>"#);
    assert_eq!(from_xml_str::<Basket>(&xml)?, empty);
    Ok(())
}

#[test]
fn test_wrapped_list_rejects_foreign_items() {
    let err = from_xml_str::<Basket>(r#"<basket owner="o"><tags><tag>a</tag><other/></tags></basket>"#)
        .unwrap_err();
    match err {
        SerdeError::UnknownName { name, candidates } => {
            assert_eq!(name, "other");
            assert_eq!(candidates, vec!["tag"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_list_of_structures_followed_by_field() -> Result<()> {
    let library = Library {
        book: vec![
            Book {
                title: "a".to_string(),
            },
            Book {
                title: "b".to_string(),
            },
        ],
        note: "n".to_string(),
    };
    let xml = to_xml_string(&library)?;
    assert_eq!(
        xml,
        r#"<library><book title="a"/><book title="b"/><note>n</note></library>"#
    );
    assert_eq!(from_xml_str::<Library>(&xml)?, library);

    // Whitespace between the items does not end the list.
    let spaced = "<library>\n  <book title=\"a\"/>\n  <book title=\"b\"/>\n  <note>n</note>\n</library>";
    assert_eq!(from_xml_str::<Library>(spaced)?, library);
    Ok(())
}

#[test]
fn test_root_collection_needs_child_name() -> Result<()> {
    let codec = XmlCodec::default();
    let named = Arc::new(
        StructureDescriptor::builder("Tags")
            .tag(QualifiedName::local("tags"))
            .child_name(QualifiedName::local("tag"))
            .build(),
    );
    let xml = codec.to_string_as(&vec!["a", "b"], Arc::clone(&named))?;
    assert_eq!(xml, "<tags><tag>a</tag><tag>b</tag></tags>");
    let decoded: Vec<String> = codec.from_str_as(&xml, named)?;
    assert_eq!(decoded, strings(&["a", "b"]));

    let anonymous = Arc::new(
        StructureDescriptor::builder("Tags")
            .tag(QualifiedName::local("tags"))
            .build(),
    );
    let err = codec.to_string_as(&vec!["a"], anonymous).unwrap_err();
    assert!(matches!(err, SerdeError::UnsupportedTopLevel(_)));
    Ok(())
}

#[test]
fn test_root_newtype_collection() -> Result<()> {
    let tags = Tags(strings(&["a", "b"]));
    let xml = to_xml_string(&tags)?;
    assert_eq!(xml, "<tags><tag>a</tag><tag>b</tag></tags>");
    assert_eq!(from_xml_str::<Tags>(&xml)?, tags);

    assert_eq!(from_xml_str::<Tags>("<tags/>")?, Tags(Vec::new()));
    Ok(())
}

#[test]
fn test_map_of_primitives() -> Result<()> {
    let counts = Counts {
        count: BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]),
    };
    let xml = to_xml_string(&counts)?;
    assert_eq!(
        xml,
        r#"<counts><count key="a" value="1"/><count key="b" value="2"/></counts>"#
    );
    assert_eq!(from_xml_str::<Counts>(&xml)?, counts);

    let empty = Counts {
        count: BTreeMap::new(),
    };
    assert_eq!(to_xml_string(&empty)?, "<counts/>");
    assert_eq!(from_xml_str::<Counts>("<counts/>")?, empty);
    Ok(())
}

#[test]
fn test_map_with_numeric_keys_and_absent_values() -> Result<()> {
    let scores = Scores {
        score: BTreeMap::from([(1, Some("x".to_string())), (2, None)]),
    };
    let xml = to_xml_string(&scores)?;
    assert_eq!(
        xml,
        r#"<scores><score key="1" value="x"/><score key="2"/></scores>"#
    );
    assert_eq!(from_xml_str::<Scores>(&xml)?, scores);
    Ok(())
}

#[test]
fn test_map_of_structures_in_wrapper() -> Result<()> {
    let registry = Registry {
        people: BTreeMap::from([
            ("x".to_string(), Person { age: 3 }),
            ("y".to_string(), Person { age: 4 }),
        ]),
    };
    let xml = to_xml_string(&registry)?;
    assert_eq!(
        xml,
        concat!(
            r#"<registry><people>"#,
            r#"<entry key="x"><value age="3"/></entry>"#,
            r#"<entry key="y"><value age="4"/></entry>"#,
            r#"</people></registry>"#
        )
    );
    assert_eq!(from_xml_str::<Registry>(&xml)?, registry);
    Ok(())
}

#[test]
fn test_map_entry_without_key() {
    let err = from_xml_str::<Counts>(r#"<counts><count value="1"/></counts>"#).unwrap_err();
    assert!(matches!(err, SerdeError::MissingFields { .. }));
}
