//! Property and subscription command handlers.

use serde::Serialize;
use tabled::Tabled;

use ciview_core::{
    ConnectionSnapshot, Controller, EntityStream, Muid, PropertyValue, Scoped, SubscriptionState,
};

use crate::cli::{GlobalOpts, SubscribeArgs, UnsubscribeArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

/// Serializable property view with the body rendered as text.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PropertyView {
    target: Muid,
    id: String,
    media_type: String,
    subscription: SubscriptionState,
    body: String,
}

impl PropertyView {
    fn new(controller: &Controller, p: &Scoped<PropertyValue>) -> Self {
        Self {
            target: p.target,
            id: p.item.id.clone(),
            media_type: p.item.media_type.clone(),
            subscription: controller
                .subscription(p.target, &p.item.id)
                .unwrap_or(SubscriptionState::Unsubscribed),
            body: body_text(&p.item),
        }
    }
}

fn body_text(value: &PropertyValue) -> String {
    value
        .body_text()
        .map_or_else(|| format!("<{} bytes>", value.body.len()), str::to_owned)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionView {
    target: Muid,
    property_id: String,
    state: SubscriptionState,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "MUID")]
    muid: String,
    #[tabled(rename = "Property")]
    id: String,
    #[tabled(rename = "Media Type")]
    media_type: String,
    #[tabled(rename = "Subscription")]
    subscription: String,
    #[tabled(rename = "Body")]
    body: String,
}

fn row(v: &PropertyView) -> PropertyRow {
    PropertyRow {
        muid: v.target.to_string(),
        id: v.id.clone(),
        media_type: v.media_type.clone(),
        subscription: v.subscription.to_string(),
        body: v.body.clone(),
    }
}

fn subscription_detail(v: &SubscriptionView) -> String {
    [
        format!("MUID:     {}", v.target),
        format!("Property: {}", v.property_id),
        format!("State:    {}", v.state),
    ]
    .join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    util::discover(controller).await?;

    let views: Vec<PropertyView> = controller
        .properties_snapshot()
        .iter()
        .map(|p| PropertyView::new(controller, p))
        .collect();

    let out = output::render_list(&global.output, &views, row, |v| {
        format!("{} {}", v.target, v.id)
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn subscribe(
    controller: &Controller,
    args: SubscribeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let target = resolve_property(controller, &args.property_id).await?;

    let mut connections = controller.connections();
    controller
        .subscribe_property(&args.property_id, args.encoding.as_deref())
        .await?;

    wait_for_state(
        &mut connections,
        target,
        &args.property_id,
        SubscriptionState::Subscribed,
    )
    .await?;

    print_subscription(target, &args.property_id, SubscriptionState::Subscribed, global);
    Ok(())
}

pub async fn unsubscribe(
    controller: &Controller,
    args: UnsubscribeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let target = resolve_property(controller, &args.property_id).await?;

    let mut connections = controller.connections();
    controller.unsubscribe_property(&args.property_id).await?;

    wait_for_state(
        &mut connections,
        target,
        &args.property_id,
        SubscriptionState::Unsubscribed,
    )
    .await?;

    print_subscription(
        target,
        &args.property_id,
        SubscriptionState::Unsubscribed,
        global,
    );
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Discover, then find the connection that exposes `property_id`.
async fn resolve_property(controller: &Controller, property_id: &str) -> Result<Muid, CliError> {
    let target = util::primary_connection(controller).await?;
    let known = controller
        .connection(target)
        .is_some_and(|c| c.property(property_id).is_some());
    if known {
        Ok(target)
    } else {
        Err(CliError::NotFound {
            resource_type: "property".into(),
            identifier: property_id.into(),
            list_command: "properties".into(),
        })
    }
}

async fn wait_for_state(
    connections: &mut EntityStream<ConnectionSnapshot>,
    target: Muid,
    property_id: &str,
    wanted: SubscriptionState,
) -> Result<(), CliError> {
    util::wait_until(connections, "subscription confirmation", |snap| {
        snap.iter()
            .find(|c| c.target() == target)
            .is_some_and(|c| {
                c.subscription(property_id)
                    .map_or(SubscriptionState::Unsubscribed, |s| s.state)
                    == wanted
            })
    })
    .await
    .map(drop)
}

fn print_subscription(
    target: Muid,
    property_id: &str,
    state: SubscriptionState,
    global: &GlobalOpts,
) {
    let view = SubscriptionView {
        target,
        property_id: property_id.to_owned(),
        state,
    };
    let out = output::render_single(&global.output, &view, subscription_detail, |v| {
        v.state.to_string()
    });
    output::print_output(&out, global.quiet);
}

#[cfg(test)]
mod tests {
    use ciview_core::JSON_MEDIA_TYPE;

    use super::*;

    #[test]
    fn body_text_falls_back_to_length() {
        let text = PropertyValue::new("p", JSON_MEDIA_TYPE, br#"{"a":1}"#.to_vec());
        assert_eq!(body_text(&text), r#"{"a":1}"#);

        let binary = PropertyValue::new("p", "application/octet-stream", vec![0xFF, 0xFE]);
        assert_eq!(body_text(&binary), "<2 bytes>");
    }
}
