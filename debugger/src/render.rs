//! Plain-text renderers for the stack and variable listings handed to
//! the editor.
use dbgp::properties::ContextProperty;
use dbgp::responses::StackFrame;

use crate::path::PathMap;
use crate::FilePath;

/// One line per frame, innermost first:
/// `[0] {main} @ /home/user/www/index.php:4`
pub fn render_stack(frames: &[StackFrame], map: &PathMap) -> String {
    let mut out = String::new();
    for frame in frames {
        let location = match FilePath::from_remote(&frame.filename, map) {
            Ok(path) => path.as_local().to_string(),
            Err(_) => frame.filename.clone(),
        };
        out.push_str(&format!(
            "[{}] {} @ {}:{}\n",
            frame.level, frame.function, location, frame.lineno
        ));
    }
    out
}

/// Indented property tree. Expandable nodes carry a marker: `▾` when the
/// children are present inline, `▸` when they still have to be fetched
/// with `property_get`.
///
/// ```text
/// $argc = (int) 4
/// ▾ $argv = (array [4])
///   $argv[0] = (string [19]) `/usr/local/bin/cake`
/// ```
pub fn render_context(properties: &[ContextProperty]) -> String {
    let mut out = String::new();
    for property in properties {
        render_property(&mut out, property);
    }
    out
}

fn render_property(out: &mut String, property: &ContextProperty) {
    out.push_str(&"  ".repeat(property.depth));
    if property.has_children {
        if property.children.is_empty() {
            out.push_str("▸ ");
        } else {
            out.push_str("▾ ");
        }
    }
    out.push_str(&property.display_name);
    out.push_str(" = (");
    out.push_str(&property.type_and_size());
    out.push(')');
    if !property.value.is_empty() {
        out.push(' ');
        out.push_str(&property.value);
    }
    out.push('\n');

    for child in &property.children {
        render_property(out, child);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use dbgp::responses::{ContextGetResponse, StackGetResponse};

    use crate::path::PathMap;

    use super::{render_context, render_stack};

    #[test]
    fn stack_listing_uses_local_paths() {
        let raw = r#"<response xmlns="urn:debugger_protocol_v1" command="stack_get" transaction_id="1">
<stack where="{main}" level="0" type="file" filename="file:///srv/www/index.php" lineno="4"/>
<stack where="helper" level="1" type="file" filename="file:///srv/www/lib.php" lineno="12"/>
</response>"#;
        let response = StackGetResponse::parse(raw).unwrap();
        let maps: BTreeMap<String, String> =
            [("/srv/www".to_string(), "/home/user/www".to_string())]
                .into_iter()
                .collect();
        let rendered = render_stack(response.get_stack(), &PathMap::new(&maps));
        assert_eq!(
            rendered,
            "[0] {main} @ /home/user/www/index.php:4\n\
             [1] helper @ /home/user/www/lib.php:12\n"
        );
    }

    #[test]
    fn context_listing_indents_and_marks_children() {
        let raw = r#"<response xmlns="urn:debugger_protocol_v1" command="context_get" transaction_id="1" context="0">
<property name="$argc" fullname="$argc" type="int">4</property>
<property name="$argv" fullname="$argv" type="array" children="1" numchildren="2">
<property name="0" fullname="$argv[0]" type="string" size="3">abc</property>
<property name="1" fullname="$argv[1]" type="string" size="3">def</property>
</property>
<property name="$big" fullname="$big" type="array" children="1" numchildren="50"/>
</response>"#;
        let response = ContextGetResponse::parse(raw).unwrap();
        let rendered = render_context(response.get_context());
        let expected = concat!(
            "$argc = (int) 4\n",
            "▾ $argv = (array [2])\n",
            "  $argv[0] = (string [3]) `abc`\n",
            "  $argv[1] = (string [3]) `def`\n",
            "▸ $big = (array [50])\n",
        );
        assert_eq!(rendered, expected);
    }
}
