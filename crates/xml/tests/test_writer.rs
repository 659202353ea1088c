mod common;

use anyhow::Result;
use xbind_xml::{Document, GenericDescriptor, Value, WriteError, Writer, WriterOptions};

use common::model;

const PROPS: &[&str] = &["properties"];

fn string(value: &str) -> Value {
    Value::String(value.to_string())
}

fn typed_root(doc: &mut Document, type_name: &str) -> xbind_xml::ElementId {
    let root = doc.create_typed(type_name);
    doc.set_root(root);
    root
}

#[test]
fn test_empty_root() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:Root");

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:root xmlns:props="http://properties"/>"#
    );
    Ok(())
}

#[test]
fn test_preamble() -> Result<()> {
    let writer = Writer::with_options(model(PROPS)?, WriterOptions { preamble: true });
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:Root");

    assert_eq!(
        writer.to_xml(&doc, root)?,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<props:root xmlns:props=\"http://properties\"/>"
    );
    Ok(())
}

#[test]
fn test_attributes() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:Attributes");
    doc.set(root, "stringValue", string("a<b"));
    doc.set(root, "integerValue", Value::Integer(10));
    doc.set(root, "booleanValue", Value::Boolean(true));
    doc.set(root, "realValue", Value::Real(1.5));

    // declaration order of the model, not insertion order
    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:attributes xmlns:props="http://properties" integerValue="10" booleanValue="true" realValue="1.5" stringValue="a&lt;b"/>"#
    );
    Ok(())
}

#[test]
fn test_body_is_escaped() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:SimpleBody");
    doc.set(root, "body", string("< 10, > 20, &nbsp;"));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:simpleBody xmlns:props="http://properties">&lt; 10, &gt; 20, &amp;nbsp;</props:simpleBody>"#
    );
    Ok(())
}

#[test]
fn test_value_children() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:SimpleBodyProperties");
    doc.push(root, "str", string("A"));
    doc.push(root, "str", string("B"));
    doc.set(root, "intValue", Value::Integer(5));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:simpleBodyProperties xmlns:props="http://properties"><props:intValue>5</props:intValue><props:str>A</props:str><props:str>B</props:str></props:simpleBodyProperties>"#
    );
    Ok(())
}

#[test]
fn test_contained_elements_use_type_tag() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:ContainedCollection");
    doc.set(root, "id", string("C_5"));
    for id in ["C_1", "C_2"] {
        let child = doc.create_typed("props:Complex");
        doc.set(child, "id", string(id));
        doc.push(root, "children", Value::Element(child));
    }

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:containedCollection xmlns:props="http://properties" id="C_5"><props:complex id="C_1"/><props:complex id="C_2"/></props:containedCollection>"#
    );
    Ok(())
}

#[test]
fn test_xsi_type_for_subtype() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:ComplexAttrs");
    let attrs = doc.create_typed("props:SubAttributes");
    doc.set(attrs, "integerValue", Value::Integer(10));
    doc.set(root, "attrs", Value::Element(attrs));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:complexAttrs xmlns:props="http://properties" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><props:attrs xsi:type="props:SubAttributes" integerValue="10"/></props:complexAttrs>"#
    );
    Ok(())
}

#[test]
fn test_no_xsi_type_for_declared_type() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:ComplexAttrs");
    let attrs = doc.create_typed("props:Attributes");
    doc.set(attrs, "integerValue", Value::Integer(10));
    doc.set(root, "attrs", Value::Element(attrs));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:complexAttrs xmlns:props="http://properties"><props:attrs integerValue="10"/></props:complexAttrs>"#
    );
    Ok(())
}

#[test]
fn test_xsi_type_with_type_prefix() -> Result<()> {
    let writer = Writer::new(model(&["datatype", "datatype-aliased"])?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "dt:Root");
    let rect = doc.create_typed("da:Rect");
    doc.set(rect, "z", Value::Integer(200));
    doc.push(root, "otherBounds", Value::Element(rect));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<dt:root xmlns:dt="http://datatypes" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:da="http://datatypes-aliased"><dt:otherBounds xsi:type="da:tRect" z="200"/></dt:root>"#
    );
    Ok(())
}

#[test]
fn test_references() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:Root");

    let container = doc.create_typed("props:ContainedCollection");
    doc.set(container, "id", string("C_5"));
    doc.push(root, "any", Value::Element(container));
    let mut complexes = Vec::new();
    for id in ["C_1", "C_2"] {
        let child = doc.create_typed("props:Complex");
        doc.set(child, "id", string(id));
        doc.push(container, "children", Value::Element(child));
        complexes.push(child);
    }

    let single = doc.create_typed("props:ReferencingSingle");
    doc.set(single, "referencedComplex", Value::Reference(complexes[0]));
    doc.push(root, "any", Value::Element(single));

    let collection = doc.create_typed("props:ReferencingCollection");
    doc.push(collection, "references", Value::Reference(complexes[1]));
    doc.push(collection, "references", Value::Reference(container));
    doc.push(root, "any", Value::Element(collection));

    let attributes = doc.create_typed("props:AttributeReferenceCollection");
    doc.push(attributes, "refs", Value::Reference(complexes[0]));
    doc.push(attributes, "refs", Value::Reference(complexes[1]));
    doc.push(root, "any", Value::Element(attributes));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        concat!(
            r#"<props:root xmlns:props="http://properties">"#,
            r#"<props:containedCollection id="C_5"><props:complex id="C_1"/><props:complex id="C_2"/></props:containedCollection>"#,
            r#"<props:referencingSingle referencedComplex="C_1"/>"#,
            r#"<props:referencingCollection><props:references>C_2</props:references><props:references>C_5</props:references></props:referencingCollection>"#,
            r#"<props:attributeReferenceCollection refs="C_1 C_2"/>"#,
            r#"</props:root>"#
        )
    );
    Ok(())
}

#[test]
fn test_reference_falls_back_to_identity() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:ReferencingSingle");
    let target = doc.create_typed("props:Base");
    doc.set_identity(target, "B_1");
    doc.set(root, "referencedComplex", Value::Reference(target));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:referencingSingle xmlns:props="http://properties" referencedComplex="B_1"/>"#
    );
    Ok(())
}

#[test]
fn test_reference_without_id() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:ReferencingSingle");
    let target = doc.create_typed("props:Base");
    doc.set(root, "referencedComplex", Value::Reference(target));

    let err = writer.to_xml(&doc, root).err();

    assert!(matches!(err, Some(WriteError::MissingReferenceId(ref t)) if t == "props:Base"));
    Ok(())
}

#[test]
fn test_unknown_type() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:Missing");

    let err = writer.to_xml(&doc, root).err();

    assert!(matches!(err, Some(WriteError::UnknownType(ref t)) if t == "props:Missing"));
    Ok(())
}

#[test]
fn test_extension_attribute_is_prefixed() -> Result<()> {
    let writer = Writer::new(model(&["extension-base", "extension-custom"])?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "b:Root");
    doc.set(root, "customAttr", Value::Integer(666));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<b:Root xmlns:b="http://base" xmlns:c="http://custom" c:customAttr="666"/>"#
    );
    Ok(())
}

#[test]
fn test_generic_extension_elements() -> Result<()> {
    let writer = Writer::new(model(&["extensions"])?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "e:Root");
    doc.set(root, "id", string("FOO"));

    let meta = doc.create_generic(GenericDescriptor::new("other", "meta", "http://other"));
    doc.set_attr(meta, "key", "k1");
    doc.push(root, "extensions", Value::Element(meta));

    let note = doc.create_generic(GenericDescriptor::new("other", "note", "http://other"));
    doc.set_body(note, Some("a note".to_string()));
    doc.push(root, "extensions", Value::Element(note));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<e:root xmlns:e="http://extensions" xmlns:other="http://other"><e:id>FOO</e:id><other:meta key="k1"/><other:note>a note</other:note></e:root>"#
    );
    Ok(())
}

#[test]
fn test_clashing_prefix_gets_fresh_name() -> Result<()> {
    let writer = Writer::new(model(&["extensions"])?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "e:Root");

    let foreign = doc.create_generic(GenericDescriptor::new("e", "meta", "http://other"));
    doc.push(root, "extensions", Value::Element(foreign));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<e:root xmlns:e="http://extensions"><ns0:meta xmlns:ns0="http://other"/></e:root>"#
    );
    Ok(())
}

#[test]
fn test_source_default_namespace_is_reused() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:ComplexAttrsCol");
    doc.set_attr(root, "xmlns", "http://properties");
    let attrs = doc.create_typed("props:Attributes");
    doc.set(attrs, "booleanValue", Value::Boolean(false));
    doc.push(root, "attrs", Value::Element(attrs));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<complexAttrsCol xmlns="http://properties"><attributes booleanValue="false"/></complexAttrsCol>"#
    );
    Ok(())
}

#[test]
fn test_unused_source_declaration_is_dropped() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:Root");
    doc.set_attr(root, "xmlns:props", "http://properties");
    doc.set_attr(root, "xmlns:unused", "http://unused");

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<props:root xmlns:props="http://properties"/>"#
    );
    Ok(())
}

#[test]
fn test_no_namespace_element_under_default() -> Result<()> {
    let writer = Writer::new(model(&["extension-base"])?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "b:Root");
    doc.set_attr(root, "xmlns", "http://base");

    let any = doc.create_generic(GenericDescriptor::new("", "Any", ""));
    doc.set_attr(any, "foo", "BAR");
    doc.set(root, "generic", Value::Element(any));

    assert_eq!(
        writer.to_xml(&doc, root)?,
        r#"<Root xmlns="http://base"><Any xmlns="" foo="BAR"/></Root>"#
    );
    Ok(())
}

#[test]
fn test_to_writer() -> Result<()> {
    let writer = Writer::new(model(PROPS)?);
    let mut doc = Document::new();
    let root = typed_root(&mut doc, "props:Root");
    doc.set(root, "id", string("R"));

    let mut out = Vec::new();
    writer.to_writer(&doc, root, &mut out)?;

    assert_eq!(
        String::from_utf8(out)?,
        r#"<props:root xmlns:props="http://properties" id="R"/>"#
    );
    Ok(())
}
