//! Binds a small sign-up form, validates it and prints the messages.

use std::sync::Arc;

use formguard_validator::prelude::*;

fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let doc = Arc::new(Document::new());
    let name = doc.append(Element::input("text").with_attr("name", "name").with_attr("required", ""));
    let mail = doc.append(
        Element::input("email")
            .with_attr("name", "mail")
            .with_value("not an address"),
    );
    doc.append(
        Element::input("text")
            .with_attr("name", "code")
            .with_attr("data-parsley-length", "[4, 6]")
            .with_value("123"),
    );
    doc.append(Element::input("submit").with_attr("name", "action").with_attr("value", "join"));

    let engine = Engine::builder().transport(Arc::new(NoTransport)).build();
    let mut form = engine.bind_form(doc, OptionLayer::new())?;

    let validity = form.validate(FormValidateOptions::default())?;
    println!("form valid: {}", validity.is_valid());
    for field in form.fields() {
        for message in field.error_messages() {
            println!("  {}: {message}", field.key());
        }
    }

    name.set_value("Ada");
    mail.set_value("ada@example.com");
    let mut submit = SubmitEvent::native(None);
    let verdict = match form.intercept_submit(&mut submit)? {
        Interception::Proceed => "proceeds",
        Interception::Prevented => "prevented",
        Interception::Deferred(_) => "waits for remote checks",
    };
    println!("submit {verdict}, {} failures", form.validity().failures().len());
    Ok(())
}
