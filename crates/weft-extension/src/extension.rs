//! The extension trait.

use crate::env::Env;
use tracing::warn;
use weft_msg::Message;
use weft_types::StatusCode;

fn ack_or_warn(what: &str, result: Result<(), crate::EnvError>) {
    if let Err(e) = result {
        warn!(error = %e, "default {what} acknowledgement failed");
    }
}

/// A user-written graph node.
///
/// All nine callbacks are optional. The lifecycle defaults acknowledge
/// their phase immediately; the default [`on_cmd`](Self::on_cmd) answers
/// with `Ok` and detail `"default"`; the frame callbacks default to
/// no-ops.
///
/// # Contract
///
/// - Callbacks run on the owning group's thread, strictly serialised with
///   the other extensions in the group.
/// - Each lifecycle callback must eventually cause the matching
///   `xxx_done` on the env (directly or from async work through an
///   [`EnvProxy`](crate::EnvProxy)); the engine's barrier waits for it.
/// - `on_cmd` must eventually produce a final result for every command,
///   directly via [`Env::return_result`] or by forwarding the command.
/// - A panic in any callback is contained by the runtime: the extension
///   is marked faulted and the graph is asked to stop.
pub trait Extension: Send {
    /// Declare properties and schemas. The default acknowledges
    /// immediately.
    fn on_configure(&mut self, env: &mut dyn Env) {
        ack_or_warn("configure", env.configure_done());
    }

    /// Acquire resources. The default acknowledges immediately.
    fn on_init(&mut self, env: &mut dyn Env) {
        ack_or_warn("init", env.init_done());
    }

    /// The graph is fully wired. The default acknowledges immediately.
    fn on_start(&mut self, env: &mut dyn Env) {
        ack_or_warn("start", env.start_done());
    }

    /// Graceful shutdown. The default acknowledges immediately.
    fn on_stop(&mut self, env: &mut dyn Env) {
        ack_or_warn("stop", env.stop_done());
    }

    /// Release resources. The default acknowledges immediately.
    fn on_deinit(&mut self, env: &mut dyn Env) {
        ack_or_warn("deinit", env.deinit_done());
    }

    /// Handle a command. The default returns `Ok` with detail
    /// `"default"`.
    fn on_cmd(&mut self, env: &mut dyn Env, cmd: Message) {
        let result = Message::cmd_result_for(StatusCode::Ok, &cmd).with_detail("default");
        if let Err(e) = env.return_result(result, &cmd) {
            warn!(error = %e, cmd = cmd.name(), "default on_cmd could not return result");
        }
    }

    /// Handle a data frame. No-op by default.
    fn on_data(&mut self, _env: &mut dyn Env, _data: Message) {}

    /// Handle an audio frame. No-op by default.
    fn on_audio_frame(&mut self, _env: &mut dyn Env, _frame: Message) {}

    /// Handle a video frame. No-op by default.
    fn on_video_frame(&mut self, _env: &mut dyn Env, _frame: Message) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LifecyclePhase;
    use crate::testing::TestEnv;

    /// An extension relying entirely on the defaults.
    struct Passive;
    impl Extension for Passive {}

    #[test]
    fn lifecycle_defaults_acknowledge() {
        let mut ext = Passive;
        let mut env = TestEnv::new("p");

        ext.on_configure(&mut env);
        ext.on_init(&mut env);
        ext.on_start(&mut env);
        ext.on_stop(&mut env);
        ext.on_deinit(&mut env);

        assert_eq!(
            env.acked(),
            &[
                LifecyclePhase::Configure,
                LifecyclePhase::Init,
                LifecyclePhase::Start,
                LifecyclePhase::Stop,
                LifecyclePhase::Deinit,
            ]
        );
    }

    #[test]
    fn default_on_cmd_returns_ok_default() {
        let mut ext = Passive;
        let mut env = TestEnv::new("p");

        let cmd = Message::cmd("ping");
        ext.on_cmd(&mut env, cmd.clone());

        assert_eq!(env.returned().len(), 1);
        let result = &env.returned()[0];
        assert_eq!(result.status_code(), Some(StatusCode::Ok));
        assert_eq!(result.detail(), Some("default"));
        assert_eq!(result.cmd_id(), cmd.cmd_id());
        assert_eq!(result.is_final(), Some(true));
    }

    #[test]
    fn default_frame_callbacks_are_noops() {
        let mut ext = Passive;
        let mut env = TestEnv::new("p");

        ext.on_data(&mut env, Message::data("d"));
        ext.on_audio_frame(&mut env, Message::audio_frame("a"));
        ext.on_video_frame(&mut env, Message::video_frame("v"));

        assert!(env.sent().is_empty());
        assert!(env.returned().is_empty());
    }
}
