//! Offline subtask suggestions, used when the server-side generator is
//! unavailable.

const PATTERNS: &[(&str, [&str; 5])] = &[
    (
        "프로젝트",
        [
            "요구사항 분석하기",
            "기획서 작성하기",
            "디자인 시안 제작하기",
            "개발 일정 수립하기",
            "테스트 계획 세우기",
        ],
    ),
    (
        "운동",
        [
            "운동복 준비하기",
            "워밍업 10분 하기",
            "메인 운동 30분 하기",
            "쿨다운 5분 하기",
            "운동 기록 작성하기",
        ],
    ),
    (
        "요리",
        ["재료 목록 작성하기", "장보기", "재료 손질하기", "요리하기", "설거지하기"],
    ),
    (
        "공부",
        [
            "학습 계획 세우기",
            "교재 준비하기",
            "핵심 개념 정리하기",
            "문제 풀이하기",
            "복습하기",
        ],
    ),
    (
        "여행",
        [
            "목적지 조사하기",
            "숙소 예약하기",
            "교통편 예약하기",
            "여행 일정 계획하기",
            "짐 싸기",
        ],
    ),
];

const GENERIC: [&str; 5] = [
    "세부 계획 수립하기",
    "필요한 자료 준비하기",
    "실행하기",
    "결과 확인하기",
    "완료 정리하기",
];

/// Five subtasks for `task`: the first keyword contained in it picks the
/// list, anything else gets the generic steps.
pub fn suggest_subtasks(task: &str) -> &'static [&'static str] {
    PATTERNS
        .iter()
        .find(|(keyword, _)| task.contains(keyword))
        .map(|(_, steps)| steps.as_slice())
        .unwrap_or(GENERIC.as_slice())
}
