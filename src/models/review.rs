use serde::{Deserialize, Serialize};

/// Envelope returned by the Kyobo review list API.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewListPayload {
    #[serde(default)]
    pub data: Option<ReviewListData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewListData {
    #[serde(rename = "reviewList", default)]
    pub review_list: Vec<RawReview>,
    #[serde(rename = "totalCount", default)]
    pub total_count: u32,
}

/// A review exactly as the API sends it. Every field is optional in
/// practice, so everything defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReview {
    #[serde(rename = "revwCntt", default)]
    pub content: String,
    #[serde(rename = "revwRvgr", default)]
    pub rating: u32,
    #[serde(rename = "revwEmtnKywrName", default)]
    pub emotion_keyword: String,
    #[serde(rename = "mmbrId", default)]
    pub member_id: String,
    #[serde(rename = "cretDttm", default)]
    pub created_at: String,
    #[serde(rename = "reviewRecommendCount", default)]
    pub recommend_count: u32,
    #[serde(rename = "reviewCommentCount", default)]
    pub comment_count: u32,
}

/// A cleaned review ready for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub product_code: String,
    pub content: String,
    /// Kyobo uses a 10-point scale.
    pub rating: u32,
    pub emotion_keyword: String,
    pub reviewer_id: String,
    /// `YYYY-MM-DD`, when the API provided a creation timestamp.
    pub review_date: Option<String>,
    pub helpful_count: u32,
    pub comment_count: u32,
}

impl Review {
    pub fn from_raw(raw: RawReview, product_code: &str) -> Self {
        let reviewer_id = if raw.member_id.trim().is_empty() {
            "익명".to_string()
        } else {
            raw.member_id
        };
        let review_date = if raw.created_at.is_empty() {
            None
        } else {
            Some(raw.created_at.chars().take(10).collect())
        };

        Self {
            product_code: product_code.to_string(),
            content: raw.content.trim().to_string(),
            rating: raw.rating,
            emotion_keyword: raw.emotion_keyword,
            reviewer_id,
            review_date,
            helpful_count: raw.recommend_count,
            comment_count: raw.comment_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_api_field_names() {
        let body = r#"{
            "data": {
                "reviewList": [
                    {
                        "revwCntt": "  정말 좋은 책입니다  ",
                        "revwRvgr": 10,
                        "revwEmtnKywrName": "도움돼요",
                        "mmbrId": "reader*1",
                        "cretDttm": "2025-07-14 09:31:22",
                        "reviewRecommendCount": 3,
                        "reviewCommentCount": 1
                    }
                ],
                "totalCount": 152
            }
        }"#;

        let payload: ReviewListPayload = serde_json::from_str(body).unwrap();
        let data = payload.data.unwrap();
        assert_eq!(data.total_count, 152);

        let review = Review::from_raw(data.review_list[0].clone(), "S000210621680");
        assert_eq!(review.content, "정말 좋은 책입니다");
        assert_eq!(review.reviewer_id, "reader*1");
        assert_eq!(review.review_date.as_deref(), Some("2025-07-14"));
        assert_eq!(review.helpful_count, 3);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let raw: RawReview = serde_json::from_str(r#"{"revwCntt": "짧은 평"}"#).unwrap();
        let review = Review::from_raw(raw, "S001");

        assert_eq!(review.reviewer_id, "익명");
        assert_eq!(review.rating, 0);
        assert!(review.review_date.is_none());
    }

    #[test]
    fn empty_payload_data_is_tolerated() {
        let payload: ReviewListPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.data.is_none());
    }
}
