//! The recursive variable/value tree returned by `context_get`,
//! `property_get` and `eval`.
use base64::Engine;

/// One variable/value node.
///
/// Children are attached inline when the engine nests them in the same
/// document. When the engine pages children instead, `has_children` stays
/// true with an empty child list, and the caller fetches them later with
/// `property_get` keyed by the property's full name.
#[derive(Debug, Clone)]
pub struct ContextProperty {
    /// The property's full name, e.g. `$argv[0]` or `obj.obj_var`.
    pub display_name: String,
    pub type_name: String,
    /// Display value. String-typed values are wrapped in backticks so
    /// renderers can tell `"4"` from `4`; numeric/scalar values are bare.
    pub value: String,
    /// Nesting level: 0 at the top of a context, parent + 1 below.
    pub depth: usize,
    pub has_children: bool,
    /// The child count the engine declared, which may exceed the number
    /// of children delivered inline.
    pub declared_children: usize,
    pub size: Option<usize>,
    pub children: Vec<ContextProperty>,
}

impl ContextProperty {
    pub(crate) fn from_node(node: roxmltree::Node<'_, '_>, depth: usize) -> Self {
        let type_name = node
            .attribute("classname")
            .or_else(|| node.attribute("type"))
            .unwrap_or("unknown")
            .to_string();
        let display_name = determine_display_name(node, &type_name);

        let declared_children: usize = node
            .attribute("numchildren")
            .or_else(|| node.attribute("children"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let has_children = declared_children > 0;

        let value = if has_children {
            String::new()
        } else {
            determine_value(node, &type_name)
        };

        let children = if has_children {
            node.children()
                .filter(|n| n.is_element() && n.tag_name().name() == "property")
                .map(|n| Self::from_node(n, depth + 1))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            display_name,
            type_name,
            value,
            depth,
            has_children,
            declared_children,
            size: node.attribute("size").and_then(|v| v.parse().ok()),
            children,
        }
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Type annotation for rendering, e.g. `array [4]` or plain `int`.
    pub fn type_and_size(&self) -> String {
        let size = if self.has_children {
            Some(self.declared_children)
        } else {
            self.size
        };
        match size {
            Some(size) => format!("{} [{}]", self.type_name, size),
            None => self.type_name.clone(),
        }
    }
}

fn determine_display_name(node: roxmltree::Node<'_, '_>, type_name: &str) -> String {
    let name = node
        .attribute("fullname")
        .map(str::to_string)
        .or_else(|| encoded_child_text(node, "fullname"))
        .or_else(|| node.attribute("name").map(str::to_string))
        .or_else(|| encoded_child_text(node, "name"))
        .unwrap_or_else(|| "?".to_string());
    // anonymous class members report their name as "::"
    if name == "::" {
        type_name.to_string()
    } else {
        name
    }
}

fn determine_value(node: roxmltree::Node<'_, '_>, type_name: &str) -> String {
    let value = encoded_child_text(node, "value").or_else(|| match node.attribute("encoding") {
        Some("base64") => Some(node.text().map(decode_base64).unwrap_or_default()),
        _ if type_name != "uninitialized" => node.text().map(str::to_string),
        _ => None,
    });
    let value = value.unwrap_or_default();

    if matches!(type_name.to_lowercase().as_str(), "string" | "str" | "scalar") {
        format!("`{}`", value.replace('`', "\\`"))
    } else {
        value
    }
}

/// Text of a direct child element, decoded when it declares
/// `encoding="base64"`.
fn encoded_child_text(node: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    let child = node
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == tag)?;
    let text = child.text()?;
    if child.attribute("encoding") == Some("base64") {
        Some(decode_base64(text))
    } else {
        Some(text.to_string())
    }
}

fn decode_base64(text: &str) -> String {
    base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
