//! Command dispatch table
//!
//! One handler per supported trait command. A handler is a pure function of
//! the command parameters, the device document, and the pre-command state
//! snapshot; it yields the dotted-path writes to persist (committed as one
//! atomic patch) and the keys to overlay onto the echoed state map. Any
//! persisted write is rooted at `states.`.

use serde_json::{Map, Value};

use crate::error::{ExecuteError, ExecuteResult};
use crate::model::{DeviceDoc, StateMap};

/// Fixed stream URL echoed by `GetCameraStream`.
const CAMERA_STREAM_URL: &str = "https://fluffysheep.com/baaaaa.mp4";

/// What a handler decided: the fields to persist and the subset of state to
/// echo back on top of the pre-command snapshot.
#[derive(Debug, Default)]
pub struct CommandOutcome {
    /// Dotted-path writes, committed in one atomic update call.
    pub updates: Vec<(String, Value)>,
    /// Keys overlaid onto the returned snapshot copy.
    pub echo: StateMap,
}

impl CommandOutcome {
    fn write(&mut self, path: &str, value: Value) {
        self.updates.push((path.to_string(), value));
    }

    fn echo(&mut self, key: &str, value: Value) {
        self.echo.insert(key.to_string(), value);
    }
}

/// Parameter lookup mirroring the loose document semantics: an absent
/// parameter reads as `null` and is persisted as such.
fn param(params: &Map<String, Value>, key: &str) -> Value {
    params.get(key).cloned().unwrap_or(Value::Null)
}

/// Dispatch a command against the pre-command snapshot.
pub fn dispatch(
    command: &str,
    params: &Map<String, Value>,
    device: &DeviceDoc,
    snapshot: &StateMap,
) -> ExecuteResult<CommandOutcome> {
    let mut out = CommandOutcome::default();
    match command {
        // action.devices.traits.ArmDisarm
        "action.devices.commands.ArmDisarm" => {
            // A present `cancel` inverts the requested arm value.
            let armed = match params.get("arm").and_then(Value::as_bool) {
                Some(arm) if params.contains_key("cancel") => Some(Value::Bool(!arm)),
                Some(arm) => Some(Value::Bool(arm)),
                None => snapshot.get("isArmed").cloned(),
            };
            if let Some(armed) = armed {
                out.write("states.isArmed", armed.clone());
                out.echo("isArmed", armed);
            }
            if params.contains_key("armLevel") {
                let level = param(params, "armLevel");
                out.write("states.currentArmLevel", level.clone());
                out.echo("currentArmLevel", level);
            }
        }

        // action.devices.traits.Brightness
        "action.devices.commands.BrightnessAbsolute" => {
            let brightness = param(params, "brightness");
            out.write("states.brightness", brightness.clone());
            out.echo("brightness", brightness);
        }

        // action.devices.traits.CameraStream
        "action.devices.commands.GetCameraStream" => {
            // No persistence; the URL is served straight back.
            out.echo("cameraStreamAccessUrl", Value::String(CAMERA_STREAM_URL.into()));
        }

        // action.devices.traits.ColorSetting
        "action.devices.commands.ColorAbsolute" => {
            let color = params.get("color").and_then(Value::as_object);
            let Some(color) = color else {
                return Err(ExecuteError::NotSupported);
            };
            if let Some(rgb) = color.get("spectrumRGB") {
                out.write("states.color.spectrumRgb", rgb.clone());
                out.echo("spectrumRgb", rgb.clone());
            } else if let Some(hsv) = color.get("spectrumHSV") {
                out.write("states.color.spectrumHsv", hsv.clone());
                out.echo("spectrumHsv", hsv.clone());
            } else if let Some(kelvin) = color.get("temperature") {
                out.write("states.color.temperatureK", kelvin.clone());
                out.echo("temperatureK", kelvin.clone());
            } else {
                return Err(ExecuteError::NotSupported);
            }
        }

        // action.devices.traits.Dock
        "action.devices.commands.Dock" => {
            out.write("states.isDocked", Value::Bool(true));
            out.echo("isDocked", Value::Bool(true));
        }

        // action.devices.traits.FanSpeed
        "action.devices.commands.SetFanSpeed" => {
            let speed = param(params, "fanSpeed");
            out.write("states.currentFanSpeedSetting", speed.clone());
            out.echo("currentFanSpeedSetting", speed);
        }
        "action.devices.commands.Reverse" => {
            out.write("states.currentFanSpeedReverse", Value::Bool(true));
        }

        // action.devices.traits.Locator
        "action.devices.commands.Locate" => {
            out.write("states.silent", param(params, "silent"));
            out.write("states.generatedAlert", Value::Bool(true));
            out.echo("generatedAlert", Value::Bool(true));
        }

        // action.devices.traits.LockUnlock
        "action.devices.commands.LockUnlock" => {
            let locked = param(params, "lock");
            out.write("states.isLocked", locked.clone());
            out.echo("isLocked", locked);
        }

        // action.devices.traits.OnOff
        "action.devices.commands.OnOff" => {
            let on = param(params, "on");
            out.write("states.on", on.clone());
            out.echo("on", on);
        }

        // action.devices.traits.OpenClose
        "action.devices.commands.OpenClose" => {
            let percent = param(params, "openPercent");
            if device.has_open_direction() {
                // Multi-direction device: patch only the list entry whose
                // direction matches, then write the whole list back.
                let direction = params.get("openDirection").and_then(Value::as_str);
                if let Some(mut open_states) =
                    snapshot.get("openState").and_then(Value::as_array).cloned()
                {
                    for entry in open_states.iter_mut() {
                        let matches =
                            entry.get("openDirection").and_then(Value::as_str) == direction;
                        if matches {
                            if let Some(entry) = entry.as_object_mut() {
                                entry.insert("openPercent".into(), percent.clone());
                            }
                        }
                    }
                    out.write("states.openState", Value::Array(open_states.clone()));
                    out.echo("openStates", Value::Array(open_states));
                }
            } else {
                out.write("states.openPercent", percent.clone());
                out.echo("openPercent", percent);
            }
        }

        // action.devices.traits.Scene — stateless to the caller
        "action.devices.commands.ActivateScene" => {
            out.write("states.deactivate", param(params, "deactivate"));
        }

        // action.devices.traits.StartStop
        "action.devices.commands.StartStop" => {
            let running = param(params, "start");
            out.write("states.isRunning", running.clone());
            out.echo("isRunning", running);
        }
        "action.devices.commands.PauseUnpause" => {
            let paused = param(params, "pause");
            out.write("states.isPaused", paused.clone());
            out.echo("isPaused", paused);
        }

        // action.devices.traits.Modes
        "action.devices.commands.SetModes" => {
            let merged = merge_settings(snapshot, "currentModeSettings", params, "updateModeSettings");
            out.write("states.currentModeSettings", Value::Object(merged.clone()));
            out.echo("currentModeSettings", Value::Object(merged));
        }

        // action.devices.traits.Toggles
        "action.devices.commands.SetToggles" => {
            let merged =
                merge_settings(snapshot, "currentToggleSettings", params, "updateToggleSettings");
            out.write("states.currentToggleSettings", Value::Object(merged.clone()));
            out.echo("currentToggleSettings", Value::Object(merged));
        }

        // action.devices.traits.Timer
        "action.devices.commands.TimerStart" => {
            let seconds = param(params, "timerTimeSec");
            out.write("states.timerRemainingSec", seconds.clone());
            out.echo("timerRemainingSec", seconds);
        }
        "action.devices.commands.TimerAdjust" => {
            let remaining = active_timer(snapshot)?;
            let delta = params.get("timerTimeSec").and_then(Value::as_i64).unwrap_or(0);
            let adjusted = remaining + delta;
            if adjusted < 0 {
                return Err(ExecuteError::ValueOutOfRange);
            }
            out.write("states.timerRemainingSec", Value::from(adjusted));
            out.echo("timerRemainingSec", Value::from(adjusted));
        }
        "action.devices.commands.TimerPause" => {
            active_timer(snapshot)?;
            out.write("states.timerPaused", Value::Bool(true));
            out.echo("timerPaused", Value::Bool(true));
        }
        "action.devices.commands.TimerResume" => {
            active_timer(snapshot)?;
            out.write("states.timerPaused", Value::Bool(false));
            out.echo("timerPaused", Value::Bool(false));
        }
        "action.devices.commands.TimerCancel" => {
            active_timer(snapshot)?;
            out.write("states.timerRemainingSec", Value::from(-1));
            // Wire compatibility: callers see 0 while the store holds -1.
            out.echo("timerRemainingSec", Value::from(0));
        }

        // action.devices.traits.TemperatureControl
        "action.devices.commands.SetTemperature" => {
            let setpoint = param(params, "temperature");
            out.write("states.temperatureSetpointCelsius", setpoint.clone());
            out.echo("temperatureSetpointCelsius", setpoint);
            copy_from_snapshot(&mut out, snapshot, &["temperatureAmbientCelsius"]);
        }

        // action.devices.traits.TemperatureSetting
        "action.devices.commands.ThermostatTemperatureSetpoint" => {
            let setpoint = param(params, "thermostatTemperatureSetpoint");
            out.write("states.thermostatTemperatureSetpoint", setpoint.clone());
            out.echo("thermostatTemperatureSetpoint", setpoint);
            copy_from_snapshot(
                &mut out,
                snapshot,
                &[
                    "thermostatMode",
                    "thermostatTemperatureAmbient",
                    "thermostatHumidityAmbient",
                ],
            );
        }
        "action.devices.commands.ThermostatTemperatureSetRange" => {
            // Both bounds land in one atomic update.
            out.write(
                "states.thermostatTemperatureSetpointLow",
                param(params, "thermostatTemperatureSetpointLow"),
            );
            out.write(
                "states.thermostatTemperatureSetpointHigh",
                param(params, "thermostatTemperatureSetpointHigh"),
            );
            copy_from_snapshot(
                &mut out,
                snapshot,
                &[
                    "thermostatTemperatureSetpoint",
                    "thermostatMode",
                    "thermostatTemperatureAmbient",
                    "thermostatHumidityAmbient",
                ],
            );
        }
        "action.devices.commands.ThermostatSetMode" => {
            let mode = param(params, "thermostatMode");
            out.write("states.thermostatMode", mode.clone());
            out.echo("thermostatMode", mode);
            copy_from_snapshot(
                &mut out,
                snapshot,
                &[
                    "thermostatTemperatureSetpoint",
                    "thermostatTemperatureAmbient",
                    "thermostatHumidityAmbient",
                ],
            );
        }

        other => {
            tracing::warn!(command = other, "unrecognized command");
            return Err(ExecuteError::CommandNotSupported);
        }
    }
    Ok(out)
}

/// Merge rule for Modes/Toggles: existing map ∪ update, update wins per
/// key. A missing current or update map defaults to empty.
fn merge_settings(
    snapshot: &StateMap,
    state_key: &str,
    params: &Map<String, Value>,
    param_key: &str,
) -> Map<String, Value> {
    let mut merged = snapshot
        .get(state_key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    if let Some(update) = params.get(param_key).and_then(Value::as_object) {
        for (key, value) in update {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Current remaining seconds, or `noTimerExists` when the timer sentinel
/// (`-1`, or a missing leaf) says there is none.
fn active_timer(snapshot: &StateMap) -> ExecuteResult<i64> {
    match snapshot.get("timerRemainingSec").and_then(Value::as_i64) {
        Some(remaining) if remaining != -1 => Ok(remaining),
        _ => Err(ExecuteError::NoTimerExists),
    }
}

/// Echo unmodified snapshot leaves that the command's contract names
/// explicitly (skipped when absent; the snapshot overlay covers presence).
fn copy_from_snapshot(out: &mut CommandOutcome, snapshot: &StateMap, keys: &[&str]) {
    for key in keys {
        if let Some(value) = snapshot.get(*key) {
            out.echo(key, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn snapshot(value: Value) -> StateMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn run(
        command: &str,
        params_json: Value,
        device: &DeviceDoc,
        snapshot_json: Value,
    ) -> ExecuteResult<CommandOutcome> {
        dispatch(command, &params(params_json), device, &snapshot(snapshot_json))
    }

    fn plain_device() -> DeviceDoc {
        DeviceDoc::default()
    }

    fn writes(out: &CommandOutcome) -> Vec<(&str, &Value)> {
        out.updates.iter().map(|(p, v)| (p.as_str(), v)).collect()
    }

    #[test]
    fn on_off_writes_and_echoes() {
        let out = run(
            "action.devices.commands.OnOff",
            json!({"on": true}),
            &plain_device(),
            json!({"online": true, "on": false}),
        )
        .unwrap();
        assert_eq!(writes(&out), vec![("states.on", &json!(true))]);
        assert_eq!(out.echo.get("on"), Some(&json!(true)));
    }

    #[test]
    fn arm_disarm_with_level_persists_both_under_states() {
        let out = run(
            "action.devices.commands.ArmDisarm",
            json!({"arm": true, "armLevel": "L2"}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap();
        assert_eq!(
            writes(&out),
            vec![
                ("states.isArmed", &json!(true)),
                ("states.currentArmLevel", &json!("L2")),
            ]
        );
        assert_eq!(out.echo.get("isArmed"), Some(&json!(true)));
        assert_eq!(out.echo.get("currentArmLevel"), Some(&json!("L2")));
    }

    #[test]
    fn arm_disarm_cancel_inverts_arm() {
        let out = run(
            "action.devices.commands.ArmDisarm",
            json!({"arm": true, "cancel": true}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap();
        assert_eq!(writes(&out), vec![("states.isArmed", &json!(false))]);
    }

    #[test]
    fn arm_disarm_without_params_keeps_snapshot_value() {
        let out = run(
            "action.devices.commands.ArmDisarm",
            json!({}),
            &plain_device(),
            json!({"online": true, "isArmed": true}),
        )
        .unwrap();
        assert_eq!(writes(&out), vec![("states.isArmed", &json!(true))]);
    }

    #[test]
    fn camera_stream_has_no_writes() {
        let out = run(
            "action.devices.commands.GetCameraStream",
            json!({}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap();
        assert!(out.updates.is_empty());
        assert_eq!(
            out.echo.get("cameraStreamAccessUrl"),
            Some(&json!("https://fluffysheep.com/baaaaa.mp4"))
        );
    }

    #[test]
    fn color_variants_pick_one_spectrum() {
        let rgb = run(
            "action.devices.commands.ColorAbsolute",
            json!({"color": {"spectrumRGB": 16711680}}),
            &plain_device(),
            json!({"online": true, "color": {}}),
        )
        .unwrap();
        assert_eq!(writes(&rgb), vec![("states.color.spectrumRgb", &json!(16711680))]);
        assert_eq!(rgb.echo.get("spectrumRgb"), Some(&json!(16711680)));

        let kelvin = run(
            "action.devices.commands.ColorAbsolute",
            json!({"color": {"temperature": 4000}}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap();
        assert_eq!(writes(&kelvin), vec![("states.color.temperatureK", &json!(4000))]);
    }

    #[test]
    fn color_with_unknown_payload_not_supported() {
        let err = run(
            "action.devices.commands.ColorAbsolute",
            json!({"color": {"name": "magenta"}}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap_err();
        assert_eq!(err.tag(), "notSupported");

        let err = run(
            "action.devices.commands.ColorAbsolute",
            json!({}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap_err();
        assert_eq!(err.tag(), "notSupported");
    }

    #[test]
    fn locate_echoes_only_the_alert() {
        let out = run(
            "action.devices.commands.Locate",
            json!({"silent": true}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap();
        assert_eq!(
            writes(&out),
            vec![
                ("states.silent", &json!(true)),
                ("states.generatedAlert", &json!(true)),
            ]
        );
        assert!(!out.echo.contains_key("silent"));
        assert_eq!(out.echo.get("generatedAlert"), Some(&json!(true)));
    }

    #[test]
    fn reverse_and_scene_are_silent() {
        let reverse = run(
            "action.devices.commands.Reverse",
            json!({}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap();
        assert_eq!(
            writes(&reverse),
            vec![("states.currentFanSpeedReverse", &json!(true))]
        );
        assert!(reverse.echo.is_empty());

        let scene = run(
            "action.devices.commands.ActivateScene",
            json!({"deactivate": false}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap();
        assert_eq!(writes(&scene), vec![("states.deactivate", &json!(false))]);
        assert!(scene.echo.is_empty());
    }

    #[test]
    fn open_close_single_direction() {
        let out = run(
            "action.devices.commands.OpenClose",
            json!({"openPercent": 70}),
            &plain_device(),
            json!({"online": true, "openPercent": 0}),
        )
        .unwrap();
        assert_eq!(writes(&out), vec![("states.openPercent", &json!(70))]);
        assert_eq!(out.echo.get("openPercent"), Some(&json!(70)));
    }

    #[test]
    fn open_close_multi_direction_touches_only_the_match() {
        let mut device = plain_device();
        device.attributes.insert("openDirection".into(), json!(true));
        let out = run(
            "action.devices.commands.OpenClose",
            json!({"openDirection": "UP", "openPercent": 50}),
            &device,
            json!({
                "online": true,
                "openState": [
                    {"openDirection": "UP", "openPercent": 0},
                    {"openDirection": "DOWN", "openPercent": 0}
                ]
            }),
        )
        .unwrap();
        let expected = json!([
            {"openDirection": "UP", "openPercent": 50},
            {"openDirection": "DOWN", "openPercent": 0}
        ]);
        assert_eq!(writes(&out), vec![("states.openState", &expected)]);
        assert_eq!(out.echo.get("openStates"), Some(&expected));
    }

    #[test]
    fn open_close_multi_direction_without_list_writes_nothing() {
        let mut device = plain_device();
        device.attributes.insert("openDirection".into(), json!(true));
        let out = run(
            "action.devices.commands.OpenClose",
            json!({"openDirection": "UP", "openPercent": 50}),
            &device,
            json!({"online": true}),
        )
        .unwrap();
        assert!(out.updates.is_empty());
        assert!(out.echo.get("openStates").is_none());
    }

    #[test]
    fn set_modes_merges_update_over_current() {
        let out = run(
            "action.devices.commands.SetModes",
            json!({"updateModeSettings": {"load": "large"}}),
            &plain_device(),
            json!({"online": true, "currentModeSettings": {"load": "small", "temp": "cold"}}),
        )
        .unwrap();
        let merged = json!({"load": "large", "temp": "cold"});
        assert_eq!(writes(&out), vec![("states.currentModeSettings", &merged)]);
        assert_eq!(out.echo.get("currentModeSettings"), Some(&merged));
    }

    #[test]
    fn set_toggles_defaults_missing_maps_to_empty() {
        let out = run(
            "action.devices.commands.SetToggles",
            json!({}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap();
        assert_eq!(
            writes(&out),
            vec![("states.currentToggleSettings", &json!({}))]
        );
    }

    #[test]
    fn timer_family_respects_the_sentinel() {
        let no_timer = json!({"online": true, "timerRemainingSec": -1});
        for command in [
            "action.devices.commands.TimerAdjust",
            "action.devices.commands.TimerPause",
            "action.devices.commands.TimerResume",
            "action.devices.commands.TimerCancel",
        ] {
            let err = run(command, json!({"timerTimeSec": 5}), &plain_device(), no_timer.clone())
                .unwrap_err();
            assert_eq!(err.tag(), "noTimerExists", "{command}");
        }

        // TimerStart is exempt from the sentinel check.
        let start = run(
            "action.devices.commands.TimerStart",
            json!({"timerTimeSec": 60}),
            &plain_device(),
            no_timer,
        )
        .unwrap();
        assert_eq!(writes(&start), vec![("states.timerRemainingSec", &json!(60))]);
    }

    #[test]
    fn timer_adjust_bounds() {
        let out = run(
            "action.devices.commands.TimerAdjust",
            json!({"timerTimeSec": -5}),
            &plain_device(),
            json!({"online": true, "timerRemainingSec": 10}),
        )
        .unwrap();
        assert_eq!(writes(&out), vec![("states.timerRemainingSec", &json!(5))]);

        let err = run(
            "action.devices.commands.TimerAdjust",
            json!({"timerTimeSec": -20}),
            &plain_device(),
            json!({"online": true, "timerRemainingSec": 10}),
        )
        .unwrap_err();
        assert_eq!(err.tag(), "valueOutOfRange");
    }

    #[test]
    fn timer_cancel_echo_diverges_from_persisted_value() {
        let out = run(
            "action.devices.commands.TimerCancel",
            json!({}),
            &plain_device(),
            json!({"online": true, "timerRemainingSec": 42}),
        )
        .unwrap();
        assert_eq!(writes(&out), vec![("states.timerRemainingSec", &json!(-1))]);
        assert_eq!(out.echo.get("timerRemainingSec"), Some(&json!(0)));
    }

    #[test]
    fn thermostat_set_range_is_one_atomic_update() {
        let out = run(
            "action.devices.commands.ThermostatTemperatureSetRange",
            json!({"thermostatTemperatureSetpointLow": 18, "thermostatTemperatureSetpointHigh": 24}),
            &plain_device(),
            json!({
                "online": true,
                "thermostatTemperatureSetpoint": 21,
                "thermostatMode": "heat",
                "thermostatTemperatureAmbient": 20,
                "thermostatHumidityAmbient": 40
            }),
        )
        .unwrap();
        assert_eq!(
            writes(&out),
            vec![
                ("states.thermostatTemperatureSetpointLow", &json!(18)),
                ("states.thermostatTemperatureSetpointHigh", &json!(24)),
            ]
        );
        assert_eq!(out.echo.get("thermostatMode"), Some(&json!("heat")));
        assert_eq!(out.echo.get("thermostatTemperatureSetpoint"), Some(&json!(21)));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = run(
            "action.devices.commands.SelfDestruct",
            json!({}),
            &plain_device(),
            json!({"online": true}),
        )
        .unwrap_err();
        assert_eq!(err.tag(), "commandNotSupported");
    }
}
