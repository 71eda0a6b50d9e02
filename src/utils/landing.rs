//! 落地页重定向地址构建
//! 命中分类时代理将请求重定向到 `<landing>?cat=<分类>&origin=<原始URL>`

use url::Url;

use crate::error::GuardResult;

/// 落地页
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingPage {
    base: Url,
}

impl LandingPage {
    /// 解析落地页（必须为绝对URL）
    pub fn parse(raw: &str) -> GuardResult<Self> {
        Ok(Self {
            base: Url::parse(raw)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }

    /// 生成 Location 头的值，查询参数做表单编码
    pub fn location(&self, category: &str, origin: &str) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("cat", category)
            .append_pair("origin", origin);
        url.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_appends_category_and_origin() {
        let landing = LandingPage::parse("http://guard.local/blocked").unwrap();
        assert_eq!(
            landing.location("malware", "http://evil.com/a?b=c"),
            "http://guard.local/blocked?cat=malware&origin=http%3A%2F%2Fevil.com%2Fa%3Fb%3Dc"
        );
    }

    #[test]
    fn test_location_keeps_existing_query() {
        // 测试场景：落地页自带查询参数时追加而非覆盖
        let landing = LandingPage::parse("https://guard.local/p?lang=en").unwrap();
        assert_eq!(
            landing.location("adult", "x.org"),
            "https://guard.local/p?lang=en&cat=adult&origin=x.org"
        );
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(LandingPage::parse("/blocked").is_err());
    }
}
