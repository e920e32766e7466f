//! Keyword-based topic classification for scraped books.
//!
//! Each book carries the keyword tags from its product page. A fixed
//! mapping table scores those tags against ten economy/finance topics;
//! the three best-scoring topics become the book's categories.

/// Assigns up to three categories to a book from its keyword tags.
pub struct Categorizer {
    table: Vec<(&'static str, Vec<&'static str>)>,
}

impl Categorizer {
    pub fn new() -> Self {
        Self {
            table: vec![
                (
                    "주식투자/트레이딩",
                    vec![
                        "주식투자", "트레이더", "나스닥", "코스피", "종목", "매매", "손절매",
                        "시가총액", "급락", "급등", "저점", "고점", "상승세", "외국인", "etf",
                        "코스닥", "거래량", "시총", "변동성", "목표주가", "순매도", "레버리지",
                        "서학개미", "매수세", "밸류에이션", "대형주", "공공기관", "구조조정",
                        "상장지수펀드", "금융기관", "컨센서스", "사모펀드", "트레이딩",
                        "개인 투자자", "초보 투자자", "투자자", "배당", "수익", "포트폴리오",
                        "분산 투자", "장기 투자", "시세 차익", "밸류",
                    ],
                ),
                (
                    "투자철학/대가",
                    vec![
                        "워런 버핏", "버핏", "가치 투자", "투자 철학", "서한", "주주", "명언",
                        "필립 피셔", "피터 린치", "하워드 막스", "주주가치", "피셔", "린치",
                        "하워드", "필립", "보통주", "투자 원칙", "통찰",
                    ],
                ),
                (
                    "재테크/개인금융",
                    vec![
                        "재테크", "부자되는법", "종잣돈", "절세", "노후 준비", "연말 정산",
                        "배당금", "현금 흐름", "원금", "계좌", "국민연금", "퇴직연금",
                        "노후 자금", "자산", "절세 방법", "금융 지식", "재투자", "퇴직 연금",
                        "배당 소득", "월배당",
                    ],
                ),
                (
                    "거시경제/금융정책",
                    vec![
                        "금리", "인플레이션", "환율", "통화 정책", "기준 금리", "경기 순환",
                        "디플레이션", "버블", "중앙은행", "한국은행", "연준", "한은",
                        "기준금리", "유동성", "수출액", "달러", "gdp", "고환율", "유로",
                        "거시 경제", "거시경제", "금리 인상", "경제 원리", "경제 개념",
                        "글로벌 경제", "한국 경제", "실물 경제",
                    ],
                ),
                (
                    "지정학/국제정세",
                    vec![
                        "트럼프", "우크라", "중국", "패권", "관세", "국제 질서", "지정학",
                        "국가 전략", "자유 무역", "이스라엘", "공급망", "대만", "중동",
                        "러시아", "국제 정세", "국제 정치", "도널드 트럼프", "국가 안보",
                        "제2차 냉전", "양극",
                    ],
                ),
                (
                    "부동산/실물자산",
                    vec![
                        "부동산 투자", "주택 가격", "집값", "건폐율", "용도지역", "금", "실물",
                        "부동산", "재건축", "분양가", "금융당국", "금융사", "실거래", "보험금",
                        "재개발", "주담대", "보증금", "금융권", "원자재", "보조금",
                        "토지거래허가구역", "투자금", "갭투자", "지원금", "정비사업", "과징금",
                        "금값", "원리금", "계약금", "임대료", "다주택자", "증거금", "임차인",
                        "주택담보대출", "전셋값", "무주택자", "건물주", "월세",
                    ],
                ),
                (
                    "기업경영/리더십",
                    vec![
                        "리더십", "경영자", "비즈니스 모델", "브랜드 전략", "경쟁력",
                        "혁신 기업", "매출", "다각화", "영업이익", "브랜드", "임직원", "ceo",
                        "매출액", "이사회", "순이익", "상장사", "경영진", "ipo", "경영",
                        "상장", "지배구조", "최고경영자", "덕목", "대전환", "행동 방식",
                        "실행력", "조직",
                    ],
                ),
                (
                    "테크/스타트업",
                    vec![
                        "실리콘밸리", "스타트업", "ai", "프롬프트", "에이전트", "반도체",
                        "휴머노이드", "오픈소스", "인공지능", "전기차", "클라우드", "빅테크",
                        "데이터센터", "hbm", "자율주행", "로보틱스", "ces", "파운드리",
                        "빅데이터", "오픈ai", "낸드", "중소벤처기업부", "드론", "실리콘",
                        "밸리", "창업자", "오픈", "신경망", "컴퓨팅", "병렬", "반도체 산업",
                        "엔비디아", "클로드", "트랜스포머", "모달", "커서",
                    ],
                ),
                (
                    "경제이론/학술",
                    vec![
                        "거시 경제학", "미시 경제학", "케인스", "하이에크", "경쟁 시장",
                        "외부 효과", "노벨 경제학", "행동경제학", "연구개발", "연구소",
                        "실수요자", "수요예측", "효율성", "공급", "수요자", "경제학",
                        "경제이론", "국부론", "생산요소시장",
                    ],
                ),
                (
                    "금융시스템/위기",
                    vec![
                        "금융 위기", "금융 시스템", "화폐", "기축 통화", "부채", "가계 부채",
                        "글로벌 금융 위기", "코인", "비트코인", "암호 화폐", "알트코인",
                        "국제 금융 시장",
                    ],
                ),
            ],
        }
    }

    /// Scores every category against the keyword list and returns the
    /// top three. Matching is case-insensitive and bidirectional: a tag
    /// counts when it contains a table keyword or vice versa, at most
    /// once per category per tag. Ties break by table order.
    pub fn categorize<S: AsRef<str>>(&self, keywords: &[S]) -> Vec<String> {
        let mut scores = vec![0usize; self.table.len()];

        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if keyword.is_empty() {
                continue;
            }

            for (index, (_, table_keywords)) in self.table.iter().enumerate() {
                for table_keyword in table_keywords {
                    let table_keyword = table_keyword.to_lowercase();
                    if keyword.contains(&table_keyword) || table_keyword.contains(&keyword) {
                        scores[index] += 1;
                        break;
                    }
                }
            }
        }

        let mut ranked: Vec<(usize, usize)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score >= 1)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        ranked
            .into_iter()
            .take(3)
            .map(|(index, _)| self.table[index].0.to_string())
            .collect()
    }

    /// Convenience for comma-joined keyword strings as stored in CSV.
    pub fn categorize_str(&self, keywords: &str) -> Vec<String> {
        let parts: Vec<&str> = keywords.split(',').collect();
        self.categorize(&parts)
    }

    /// Fallback for books without keyword tags: scores categories by
    /// the table keywords appearing in the title. Longer keywords are
    /// more specific, so each hit counts its character length.
    pub fn categorize_title(&self, title: &str) -> Vec<String> {
        let title = title.to_lowercase();
        if title.trim().is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(usize, usize)> = self
            .table
            .iter()
            .enumerate()
            .map(|(index, (_, table_keywords))| {
                let score = table_keywords
                    .iter()
                    .filter(|keyword| title.contains(&keyword.to_lowercase()))
                    .map(|keyword| keyword.chars().count())
                    .sum();
                (index, score)
            })
            .filter(|(_, score)| *score >= 1)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        ranked
            .into_iter()
            .take(3)
            .map(|(index, _)| self.table[index].0.to_string())
            .collect()
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}
