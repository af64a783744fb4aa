#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

#[allow(unused)]
pub(crate) fn debug_lane_change(x: f64, from: usize, to: usize, is_ego: bool) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "lane_change",
            "x": x,
            "from": from,
            "to": to,
            "ego": is_ego,
        }))
    })
}

#[allow(unused)]
pub(crate) fn debug_desync(expected: f64, actual: f64) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "desync",
            "expected": expected,
            "actual": actual,
        }))
    })
}

#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
