use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::rest_types as rt;

/// Characters escaped inside a substituted path value. `/` is kept so nested lab paths resolve.
const PATH_VALUE: &AsciiSet = &CONTROLS
	.add(b' ').add(b'"').add(b'#').add(b'%').add(b'<').add(b'>')
	.add(b'?').add(b'`').add(b'{').add(b'}');

fn encode(value: &str) -> String {
	utf8_percent_encode(value.trim_start_matches('/'), PATH_VALUE).to_string()
}

/// Substitutes `{name}` placeholders in an endpoint template.
pub(crate) fn render_path(template: &str, vars: &[(&str, &str)]) -> String {
	vars.iter().fold(template.to_owned(), |path, (name, value)| {
		path.replace(&format!("{{{}}}", name), &encode(value))
	})
}

/// Like [`render_path`] for a template taking one trailing argument, eg. `/api/list/templates/{type}`.
/// A template written without the placeholder gets the value appended as a last path segment.
pub(crate) fn render_trailing(template: &str, name: &str, value: &str) -> String {
	let placeholder = format!("{{{}}}", name);
	if template.contains(&placeholder) {
		return template.replace(&placeholder, &encode(value));
	}

	let encoded = encode(value);
	if encoded.is_empty() {
		template.to_owned()
	} else if template.ends_with('/') {
		format!("{}{}", template, encoded)
	} else {
		format!("{}/{}", template, encoded)
	}
}

pub(crate) fn available_templates<II: IntoIterator<Item = rt::TemplateDescriptor>>(descriptors: II) -> Vec<rt::TemplateDescriptor> {
	descriptors.into_iter()
		.filter(|d| d.is_available())
		.collect()
}
