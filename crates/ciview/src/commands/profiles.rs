//! Profile command handlers.

use std::sync::Arc;

use tabled::Tabled;

use ciview_core::{
    Controller, ProfileGroup, ProfileId, ProfileState, Scoped, SetProfileRequest,
    ValidProfileRequest,
};

use crate::cli::{GlobalOpts, SetProfileArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "MUID")]
    muid: String,
    #[tabled(rename = "Profile")]
    profile_id: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Channels")]
    channels: u16,
}

fn row(p: &Arc<Scoped<ProfileState>>, color: bool) -> ProfileRow {
    ProfileRow {
        muid: p.target.to_string(),
        profile_id: p.item.profile_id.to_string(),
        group: p.item.group.to_string(),
        address: p.item.address.to_string(),
        state: output::enabled_label(p.item.enabled, color),
        channels: p.item.num_channels_requested,
    }
}

fn detail(p: &Arc<Scoped<ProfileState>>) -> String {
    [
        format!("MUID:     {}", p.target),
        format!("Profile:  {}", p.item.profile_id),
        format!("Group:    {}", p.item.group),
        format!("Address:  {}", p.item.address),
        format!(
            "State:    {}",
            if p.item.enabled { "enabled" } else { "disabled" }
        ),
        format!("Channels: {}", p.item.num_channels_requested),
    ]
    .join("\n")
}

fn plain_id(p: &Arc<Scoped<ProfileState>>) -> String {
    format!("{} {}", p.target, p.item.profile_id)
}

/// A reported profile settles the request only once its state and channel
/// count both match.
fn confirms(p: &ProfileState, valid: &ValidProfileRequest) -> bool {
    p.key() == valid.key
        && p.enabled == valid.enabled
        && p.num_channels_requested == valid.num_channels
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    util::discover(controller).await?;
    let color = output::should_color(&global.color);

    let snap = controller.profiles_snapshot();
    let out = output::render_list(&global.output, &snap, |p| row(p, color), plain_id);
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set(
    controller: &Controller,
    args: SetProfileArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = build_request(&args)?;
    let valid = request.validate()?;

    util::discover(controller).await?;

    let mut profiles = controller.profiles();
    controller.set_profile(&request).await?;

    let snap = util::wait_until(&mut profiles, "profile confirmation", |snap| {
        snap.iter().any(|p| confirms(&p.item, &valid))
    })
    .await?;

    let confirmed = snap
        .iter()
        .find(|p| confirms(&p.item, &valid))
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            resource_type: "profile".into(),
            identifier: valid.key.to_string(),
            list_command: "profiles".into(),
        })?;

    let out = output::render_single(&global.output, &confirmed, detail, plain_id);
    output::print_output(&out, global.quiet);
    Ok(())
}

fn build_request(args: &SetProfileArgs) -> Result<SetProfileRequest, CliError> {
    let group: ProfileGroup = args
        .group
        .parse()
        .map_err(|e: ciview_core::CoreError| CliError::validation("group", e.to_string()))?;
    let address = util::parse_byte("address", &args.address)?;
    let profile_id: ProfileId = args
        .profile_id
        .parse()
        .map_err(|e: ciview_core::CoreError| CliError::validation("profile-id", e.to_string()))?;

    Ok(SetProfileRequest {
        group,
        address,
        profile_id: profile_id.as_bytes().to_vec(),
        enabled: !args.disable,
        num_channels: args.channels,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ciview_core::ProfileAddress;

    use super::*;

    fn args(profile_id: &str) -> SetProfileArgs {
        SetProfileArgs {
            profile_id: profile_id.into(),
            group: "0".into(),
            address: "0x7F".into(),
            channels: 0,
            disable: false,
        }
    }

    #[test]
    fn builds_request_from_hex_args() {
        let request = build_request(&args("7E 00 01 02 03")).unwrap();
        assert_eq!(request.profile_id, vec![0x7E, 0x00, 0x01, 0x02, 0x03]);
        assert_eq!(request.address, 0x7F);
        assert_eq!(request.group, ProfileGroup::Index(0));
        assert!(request.enabled);
    }

    #[test]
    fn wildcard_group_and_disable() {
        let mut a = args("7E0001 0203");
        a.group = "*".into();
        a.disable = true;
        // Mixed spacing is not a valid id.
        assert!(build_request(&a).is_err());

        a.profile_id = "7E-00-01-02-03".into();
        let request = build_request(&a).unwrap();
        assert_eq!(request.group, ProfileGroup::Any);
        assert!(!request.enabled);
    }

    #[test]
    fn confirmation_needs_matching_channel_count() {
        let mut a = args("7E 00 01 02 03");
        a.channels = 4;
        let valid = build_request(&a).unwrap().validate().unwrap();

        let mut reported = ProfileState {
            group: ProfileGroup::Index(0),
            address: ProfileAddress::FUNCTION_BLOCK,
            profile_id: ProfileId::new([0x7E, 0x00, 0x01, 0x02, 0x03]),
            enabled: true,
            num_channels_requested: 1,
        };
        assert!(!confirms(&reported, &valid));

        reported.num_channels_requested = 4;
        assert!(confirms(&reported, &valid));

        reported.enabled = false;
        assert!(!confirms(&reported, &valid));
    }

    #[test]
    fn short_profile_id_is_a_usage_error() {
        let err = build_request(&args("7E 00")).err();
        assert!(matches!(err, Some(CliError::Validation { field, .. }) if field == "profile-id"));
    }
}
