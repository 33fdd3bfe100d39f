//! Verb table: maps wire verbs to command constructors.

use std::sync::Arc;

use crate::command::{Command, CommandKind};
use crate::device::Device;
use crate::error::{ControlError, ControlResult};

type Constructor = fn(&str, Option<&str>) -> ControlResult<CommandKind>;

const VERBS: &[(&str, Constructor)] = &[
    ("arm", arm),
    ("takeoff", takeoff),
    ("land", land),
    ("hover", hover),
    ("move_forward", move_forward),
    ("move_back", move_back),
    ("drop_payload", drop_payload),
    ("rotate", rotate),
    ("change_altitude", change_altitude),
    ("altitude", change_altitude),
];

/// Every verb the dispatcher recognizes, in table order.
pub fn verbs() -> impl Iterator<Item = &'static str> {
    VERBS.iter().map(|(verb, _)| *verb)
}

/// Resolve a verb and its optional argument into a command kind.
pub fn parse(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    let (_, constructor) = VERBS
        .iter()
        .find(|(name, _)| *name == verb)
        .ok_or_else(|| ControlError::UnknownCommand(verb.to_string()))?;
    constructor(verb, arg)
}

/// Resolve a verb into a command bound to `device`.
pub fn dispatch(device: &Arc<Device>, verb: &str, arg: Option<&str>) -> ControlResult<Command> {
    parse(verb, arg).map(|kind| Command::new(device.clone(), kind))
}

fn arm(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    no_arg(verb, arg).map(|()| CommandKind::Arm)
}

fn takeoff(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    no_arg(verb, arg).map(|()| CommandKind::Takeoff)
}

fn land(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    no_arg(verb, arg).map(|()| CommandKind::Land)
}

fn hover(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    no_arg(verb, arg).map(|()| CommandKind::Hover)
}

fn move_forward(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    no_arg(verb, arg).map(|()| CommandKind::MoveForward)
}

fn move_back(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    no_arg(verb, arg).map(|()| CommandKind::MoveBack)
}

fn drop_payload(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    no_arg(verb, arg).map(|()| CommandKind::DropPayload)
}

fn rotate(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    int_arg(verb, arg).map(|degree| CommandKind::Rotate { degree })
}

fn change_altitude(verb: &str, arg: Option<&str>) -> ControlResult<CommandKind> {
    let altitude_m = int_arg(verb, arg)?;
    if altitude_m < 0 {
        return Err(invalid(verb, "altitude must not be negative"));
    }
    Ok(CommandKind::ChangeAltitude { altitude_m })
}

fn no_arg(verb: &str, arg: Option<&str>) -> ControlResult<()> {
    match arg {
        None => Ok(()),
        Some(extra) => Err(invalid(verb, &format!("unexpected argument '{}'", extra))),
    }
}

fn int_arg(verb: &str, arg: Option<&str>) -> ControlResult<i32> {
    let raw = arg.ok_or_else(|| invalid(verb, "missing integer argument"))?;
    raw.trim()
        .parse()
        .map_err(|_| invalid(verb, &format!("'{}' is not an integer", raw)))
}

fn invalid(verb: &str, reason: &str) -> ControlError {
    ControlError::InvalidParameter {
        verb: verb.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::device;

    #[test]
    fn known_verbs_resolve() {
        assert_eq!(parse("takeoff", None).unwrap(), CommandKind::Takeoff);
        assert_eq!(parse("move_back", None).unwrap(), CommandKind::MoveBack);
        assert_eq!(
            parse("rotate", Some("-90")).unwrap(),
            CommandKind::Rotate { degree: -90 }
        );
        assert_eq!(
            parse("altitude", Some("15")).unwrap(),
            CommandKind::ChangeAltitude { altitude_m: 15 }
        );
    }

    #[test]
    fn unknown_verb_is_typed_error() {
        assert_eq!(
            parse("barrel_roll", None),
            Err(ControlError::UnknownCommand("barrel_roll".into()))
        );
        assert_eq!(parse("", None), Err(ControlError::UnknownCommand(String::new())));
    }

    #[test]
    fn bad_parameters_are_rejected() {
        assert!(matches!(
            parse("rotate", None),
            Err(ControlError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parse("rotate", Some("ninety")),
            Err(ControlError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parse("change_altitude", Some("-5")),
            Err(ControlError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parse("land", Some("now")),
            Err(ControlError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn dispatch_binds_device() {
        let drone = device("drn001");
        let command = dispatch(&drone, "hover", None).unwrap();
        assert_eq!(command.device().id(), "drn001");
        assert_eq!(command.kind(), CommandKind::Hover);
    }

    #[test]
    fn verb_table_covers_wire_verbs() {
        let table: Vec<_> = verbs().collect();
        for verb in ["takeoff", "land", "hover", "move_forward", "move_back", "arm"] {
            assert!(table.contains(&verb), "missing {}", verb);
        }
    }
}
