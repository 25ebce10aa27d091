//! 킬존 세션 판정.
//!
//! 타임스탬프가 어느 세션 창에 속하는지만 판정합니다. 세션별 동작
//! 차이는 모델링하지 않으며, 신호에 태그로만 붙습니다.
//!
//! 창 정의 (각 거래소 현지 시간):
//! - 아시아 레인지: 09:00 ~ 12:00 (Asia/Tokyo)
//! - 런던 오픈: 07:00 ~ 10:00 (Europe/London)
//! - 뉴욕 오픈: 08:30 ~ 11:00 (America/New_York)
//! - 런던 클로즈: 15:00 ~ 17:00 (Europe/London)
//!
//! 겹치는 구간은 런던 오픈 > 뉴욕 오픈 > 런던 클로즈 > 아시아 순으로
//! 우선합니다.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::{America, Asia, Europe};
use ict_core::domain::Killzone;

/// 주어진 시각에 활성화된 킬존을 반환합니다.
pub fn active_killzone(at: DateTime<Utc>) -> Option<Killzone> {
    if in_window(at, Europe::London, (7, 0), (10, 0)) {
        return Some(Killzone::LondonOpen);
    }
    if in_window(at, America::New_York, (8, 30), (11, 0)) {
        return Some(Killzone::NewYorkOpen);
    }
    if in_window(at, Europe::London, (15, 0), (17, 0)) {
        return Some(Killzone::LondonClose);
    }
    if in_window(at, Asia::Tokyo, (9, 0), (12, 0)) {
        return Some(Killzone::AsianRange);
    }
    None
}

/// 현지 시간 기준 [시작, 끝) 창에 속하는지 확인합니다.
fn in_window(
    at: DateTime<Utc>,
    tz: chrono_tz::Tz,
    start: (u32, u32),
    end: (u32, u32),
) -> bool {
    let local = at.with_timezone(&tz);
    let minutes = local.hour() * 60 + local.minute();
    let start_minutes = start.0 * 60 + start.1;
    let end_minutes = end.0 * 60 + end.1;
    minutes >= start_minutes && minutes < end_minutes
}
